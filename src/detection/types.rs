use glam::Vec2;
use serde::Deserialize;

/// Physical action a cue demonstrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Press,
    Twist,
    Pull,
    PickUp,
    PutDown,
}

/// Which end of a two-point transfer a hit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEndpoint {
    Source,
    Destination,
}

impl ActionKind {
    /// Map the model's action label to a cue kind. Unknown labels are a
    /// logged skip upstream, not an error.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "press" => Some(ActionKind::Press),
            "twist" => Some(ActionKind::Twist),
            "pull" => Some(ActionKind::Pull),
            "pick up" | "pickup" => Some(ActionKind::PickUp),
            "put down" | "place" => Some(ActionKind::PutDown),
            _ => None,
        }
    }

    /// Two-point actions contribute one endpoint of a transfer cue instead
    /// of a standalone cue.
    pub fn transfer_endpoint(&self) -> Option<TransferEndpoint> {
        match self {
            ActionKind::PickUp => Some(TransferEndpoint::Source),
            ActionKind::PutDown => Some(TransferEndpoint::Destination),
            _ => None,
        }
    }
}

/// Parsed detection for one uploaded image.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub action_label: String,
    /// Center of the detected object in source-image pixels, top-left origin.
    pub image_point: Vec2,
    /// Resolution of the image the detector saw.
    pub image_size: (u32, u32),
    /// Best candidate confidence, when the server reports any.
    pub confidence: Option<f32>,
}

/// Outcome of a detection round-trip that reached the server.
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    Detected(DetectionResult),
    /// The server answered but found nothing usable (no boxes, or an empty
    /// action). Recoverable: no cue gets placed for this picture.
    Empty,
}

/// Wire shape of the detection server's reply.
#[derive(Debug, Deserialize)]
pub(crate) struct DetectionReply {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub center: Vec<f32>,
    #[serde(default)]
    pub confidence: Vec<f32>,
    #[allow(dead_code)]
    #[serde(default)]
    pub boxes: Vec<[f32; 4]>,
    #[allow(dead_code)]
    #[serde(default)]
    pub phrases: Vec<String>,
}

impl DetectionReply {
    pub fn into_outcome(self, image_size: (u32, u32)) -> DetectionOutcome {
        if self.center.len() < 2 || self.action.is_empty() {
            return DetectionOutcome::Empty;
        }

        let confidence = self
            .confidence
            .iter()
            .copied()
            .fold(None, |best: Option<f32>, c| {
                Some(best.map_or(c, |b| b.max(c)))
            });

        DetectionOutcome::Detected(DetectionResult {
            action_label: self.action,
            image_point: Vec2::new(self.center[0], self.center[1]),
            image_size,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_case_insensitively() {
        assert_eq!(ActionKind::from_label("Press"), Some(ActionKind::Press));
        assert_eq!(ActionKind::from_label("PICK UP"), Some(ActionKind::PickUp));
        assert_eq!(ActionKind::from_label(" twist "), Some(ActionKind::Twist));
        assert_eq!(ActionKind::from_label("juggle"), None);
    }

    #[test]
    fn only_transfer_actions_have_endpoints() {
        assert_eq!(
            ActionKind::PickUp.transfer_endpoint(),
            Some(TransferEndpoint::Source)
        );
        assert_eq!(
            ActionKind::PutDown.transfer_endpoint(),
            Some(TransferEndpoint::Destination)
        );
        assert_eq!(ActionKind::Press.transfer_endpoint(), None);
    }

    #[test]
    fn empty_reply_fields_yield_empty_outcome() {
        let reply = DetectionReply {
            action: String::new(),
            center: vec![640.0, 360.0],
            confidence: vec![],
            boxes: vec![],
            phrases: vec![],
        };
        assert!(matches!(
            reply.into_outcome((1280, 720)),
            DetectionOutcome::Empty
        ));

        let reply = DetectionReply {
            action: "press".into(),
            center: vec![],
            confidence: vec![],
            boxes: vec![],
            phrases: vec![],
        };
        assert!(matches!(
            reply.into_outcome((1280, 720)),
            DetectionOutcome::Empty
        ));
    }

    #[test]
    fn best_confidence_is_selected() {
        let reply = DetectionReply {
            action: "press".into(),
            center: vec![12.0, 34.0],
            confidence: vec![0.41, 0.87, 0.66],
            boxes: vec![],
            phrases: vec![],
        };
        match reply.into_outcome((640, 480)) {
            DetectionOutcome::Detected(result) => {
                assert_eq!(result.confidence, Some(0.87));
                assert_eq!(result.image_size, (640, 480));
            }
            DetectionOutcome::Empty => panic!("expected detection"),
        }
    }
}
