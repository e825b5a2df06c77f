use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved network or cache response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// HTTP-ok: a 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response as persisted in a cache bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "body_base64")]
    pub body: Bytes,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn from_response(response: Response) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
            cached_at: Utc::now(),
        }
    }

    pub fn into_response(self) -> Response {
        Response {
            status: self.status,
            content_type: self.content_type,
            body: self.body,
        }
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn aged(minutes: i64) -> CachedResponse {
        let mut cached = CachedResponse::from_response(Response::new(200, "x"));
        cached.cached_at = Utc::now() - Duration::minutes(minutes);
        cached
    }

    #[test]
    fn test_is_ok_covers_2xx_only() {
        assert!(Response::new(200, "").is_ok());
        assert!(Response::new(204, "").is_ok());
        assert!(!Response::new(304, "").is_ok());
        assert!(!Response::new(404, "").is_ok());
        assert!(!Response::new(500, "").is_ok());
    }

    #[test]
    fn test_age_display() {
        assert_eq!(aged(0).age_display(), "just now");
        assert_eq!(aged(5).age_display(), "5m ago");
        assert_eq!(aged(90).age_display(), "2h ago");
        assert_eq!(aged(60 * 26).age_display(), "1d ago");
        assert_eq!(aged(60 * 36).age_display(), "2d ago");
    }

    #[test]
    fn test_future_timestamp_is_just_now() {
        assert_eq!(aged(-10).age_display(), "just now");
    }

    #[test]
    fn test_body_stored_as_base64() {
        let cached = CachedResponse::from_response(
            Response::new(200, vec![0u8, 159, 146, 150]).with_content_type("application/octet-stream"),
        );
        let json = serde_json::to_value(&cached).unwrap();
        assert_eq!(json["body"], "AJ+Slg==");
        assert_eq!(json["content_type"], "application/octet-stream");

        let back: CachedResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, cached);
    }
}
