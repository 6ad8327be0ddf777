use icalendar::{Calendar, Component, Event as VEvent, EventLike};

use crate::models::Event;

#[derive(Clone, Default)]
pub struct ICalExporter;

impl ICalExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, events: &[Event]) -> Vec<u8> {
        if events.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name("Campus Calendar");

        for item in events {
            let mut vevent = VEvent::new();
            vevent.summary(&item.title);
            vevent.starts(item.start_date);
            vevent.ends(item.end_date);
            if let Some(location) = &item.location {
                vevent.location(location);
            }
            let mut description = item.description.clone().unwrap_or_default();
            if let Some(class) = &item.for_class {
                description.push_str(&format!("\nClass: {class}"));
            }
            if let Some(subject) = &item.for_subject {
                description.push_str(&format!("\nSubject: {subject}"));
            }
            vevent.description(description.trim_start_matches('\n'));
            vevent.uid(&format!("{}-campus-portal", item.id));
            calendar.push(vevent);
        }

        calendar.to_string().into_bytes()
    }
}
