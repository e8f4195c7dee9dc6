//! Wall-clock times travel as `"HH:MM"`. Postgres `time` columns come back as
//! `"HH:MM:SS"`, so both are accepted on the way in.

use chrono::NaiveTime;

pub const SLOT_TIME_FORMAT: &str = "%H:%M";

pub fn parse_slot_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, SLOT_TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

pub fn format_slot_time(time: &NaiveTime) -> String {
    time.format(SLOT_TIME_FORMAT).to_string()
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_slot_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_slot_time(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&crate::time_format::format_slot_time(t)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => crate::time_format::parse_slot_time(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid time '{}', expected HH:MM", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Row {
        #[serde(with = "hhmm")]
        time: NaiveTime,
        #[serde(with = "hhmm::option", default)]
        maybe: Option<NaiveTime>,
    }

    #[test]
    fn test_accepts_postgres_time() {
        let row: Row = serde_json::from_str(r#"{"time": "14:30:00", "maybe": "09:00"}"#).unwrap();
        assert_eq!(row.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(row.maybe, NaiveTime::from_hms_opt(9, 0, 0));
    }

    #[test]
    fn test_serializes_short_form() {
        let row = Row { time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), maybe: None };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["time"], "09:00");
        assert!(json["maybe"].is_null());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_slot_time("9am").is_none());
        assert!(serde_json::from_str::<Row>(r#"{"time": "25:00"}"#).is_err());
    }
}
