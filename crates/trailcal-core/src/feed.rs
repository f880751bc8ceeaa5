//! Identity of the published calendar.

use crate::ics::{CALENDAR_TAG, CalendarObject, EVENT_TAG};

/// Fixed name and product identifier stamped on every produced calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedIdentity {
    /// Value of the `NAME` property.
    pub name: String,
    /// Value of the `PRODID` property.
    pub product_id: String,
}

impl Default for FeedIdentity {
    fn default() -> Self {
        Self {
            name: "DDD".to_string(),
            product_id: concat!("ddd/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedIdentity {
    /// Creates an identity with the given name and product identifier.
    pub fn new(name: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product_id: product_id.into(),
        }
    }

    /// Builds a calendar carrying this identity and the given events.
    pub fn calendar(&self, events: Vec<CalendarObject>) -> CalendarObject {
        CalendarObject::new(CALENDAR_TAG)
            .with_text("NAME", &self.name)
            .with_text("PRODID", &self.product_id)
            .with_components(EVENT_TAG, events)
    }

    /// Overwrites the identity properties of an existing calendar.
    pub fn stamp(&self, calendar: &mut CalendarObject) {
        calendar.set_text("NAME", &self.name);
        calendar.set_text("PRODID", &self.product_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity() {
        let identity = FeedIdentity::default();
        assert_eq!(identity.name, "DDD");
        assert!(identity.product_id.starts_with("ddd/"));
    }

    #[test]
    fn calendar_carries_identity_and_events() {
        let identity = FeedIdentity::new("Trail", "trail/1.0");
        let calendar = identity.calendar(vec![CalendarObject::new("VEVENT")]);

        assert_eq!(calendar.kind, "VCALENDAR");
        assert_eq!(calendar.text("NAME"), Some("Trail"));
        assert_eq!(calendar.text("PRODID"), Some("trail/1.0"));
        assert_eq!(calendar.events().len(), 1);
    }

    #[test]
    fn stamp_replaces_upstream_identity() {
        let mut calendar = CalendarObject::new("VCALENDAR").with_text("PRODID", "-//Upstream//EN");
        FeedIdentity::new("Trail", "trail/1.0").stamp(&mut calendar);
        assert_eq!(calendar.text("PRODID"), Some("trail/1.0"));
        assert_eq!(calendar.text("NAME"), Some("Trail"));
    }
}
