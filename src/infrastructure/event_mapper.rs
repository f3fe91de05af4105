use crate::domain::models::EventRequest;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "htmlLink", skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    pub start: CalendarEventDateTime,
    pub end: CalendarEventDateTime,
}

pub fn encode_event_request(request: &EventRequest) -> GoogleCalendarEvent {
    let time_zone = Some(request.timezone.name().to_string());
    GoogleCalendarEvent {
        id: None,
        summary: Some(request.summary.trim().to_string()),
        status: None,
        html_link: None,
        start: CalendarEventDateTime {
            date_time: request.start.to_rfc3339(),
            time_zone: time_zone.clone(),
        },
        end: CalendarEventDateTime {
            date_time: request.end.to_rfc3339(),
            time_zone,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    #[test]
    fn encodes_local_times_with_zone_name() {
        let tz: Tz = "America/New_York".parse().expect("tz");
        let start = tz.with_ymd_and_hms(2026, 2, 17, 10, 0, 0).single().expect("start");
        let request = EventRequest {
            summary: " Meeting from AI Agent ".to_string(),
            start,
            end: start + chrono::Duration::hours(1),
            timezone: tz,
        };

        let value = serde_json::to_value(encode_event_request(&request)).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "summary": "Meeting from AI Agent",
                "start": {"dateTime": "2026-02-17T10:00:00-05:00", "timeZone": "America/New_York"},
                "end": {"dateTime": "2026-02-17T11:00:00-05:00", "timeZone": "America/New_York"}
            })
        );
    }

    #[test]
    fn decodes_provider_response_with_html_link() {
        let event: GoogleCalendarEvent = serde_json::from_str(
            r#"{"kind":"calendar#event","id":"evt1","status":"confirmed",
                "htmlLink":"https://www.google.com/calendar/event?eid=ZXZ0MQ",
                "summary":"Meeting from AI Agent",
                "start":{"dateTime":"2026-02-17T10:00:00-05:00","timeZone":"America/New_York"},
                "end":{"dateTime":"2026-02-17T11:00:00-05:00","timeZone":"America/New_York"}}"#,
        )
        .expect("decode");
        assert_eq!(event.id.as_deref(), Some("evt1"));
        assert_eq!(
            event.html_link.as_deref(),
            Some("https://www.google.com/calendar/event?eid=ZXZ0MQ")
        );
    }
}
