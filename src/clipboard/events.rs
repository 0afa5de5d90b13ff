use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::format::ImageFormat;

/// Outcome of a capture, for whoever shows banners or plays sounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    TextCaptured {
        text: String,
        preview: String,
    },
    ImageCaptured {
        format: ImageFormat,
        width: u32,
        height: u32,
    },
    /// An image was not kept because it exceeded the size threshold.
    SkippedTooLarge {
        size: u64,
        limit: u64,
    },
}

pub trait CaptureListener: Send + Sync {
    fn on_capture(&self, event: CaptureEvent);
}

impl CaptureListener for UnboundedSender<CaptureEvent> {
    fn on_capture(&self, event: CaptureEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Listener that drops every event.
pub struct NoopListener;

impl CaptureListener for NoopListener {
    fn on_capture(&self, _event: CaptureEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_capture(CaptureEvent::SkippedTooLarge { size: 2, limit: 1 });
        assert_eq!(
            rx.try_recv().unwrap(),
            CaptureEvent::SkippedTooLarge { size: 2, limit: 1 }
        );

        drop(rx);
        tx.on_capture(CaptureEvent::SkippedTooLarge { size: 3, limit: 1 });
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_value(CaptureEvent::ImageCaptured {
            format: ImageFormat::Jpeg,
            width: 4,
            height: 3,
        })
        .unwrap();
        assert_eq!(json["event"], "image_captured");
        assert_eq!(json["format"], "jpeg");
    }
}
