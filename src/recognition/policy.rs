use serde::Deserialize;

use super::{AttendanceStatus, Recognition};

/// Decides which provider results count as identifications.
///
/// The recognition service applies its own match threshold; this policy is
/// the engine-side floor on top of it. `absent` reported by the provider is
/// a miss unless `accept_absent` is set.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionPolicy {
    pub min_confidence: f32,
    pub accept_absent: bool,
}

impl Default for RecognitionPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            accept_absent: false,
        }
    }
}

impl RecognitionPolicy {
    /// Returns the reason a result is rejected, if it is.
    pub fn rejection(&self, recognition: &Recognition) -> Option<String> {
        if recognition.status == AttendanceStatus::Absent && !self.accept_absent {
            return Some(format!("subject {} reported absent", recognition.subject_id));
        }
        if recognition.confidence.is_nan() || recognition.confidence < self.min_confidence {
            return Some(format!(
                "confidence {:.2} below threshold {:.2}",
                recognition.confidence, self.min_confidence
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recognition(status: AttendanceStatus, confidence: f32) -> Recognition {
        Recognition {
            subject_id: 1,
            status,
            confidence,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn rejects_below_threshold() {
        let policy = RecognitionPolicy {
            min_confidence: 0.6,
            ..RecognitionPolicy::default()
        };
        assert!(policy.rejection(&recognition(AttendanceStatus::Present, 0.59)).is_some());
        assert!(policy.rejection(&recognition(AttendanceStatus::Late, 0.6)).is_none());
        assert!(policy.rejection(&recognition(AttendanceStatus::Present, f32::NAN)).is_some());
    }

    #[test]
    fn absent_is_a_miss_unless_accepted() {
        let strict = RecognitionPolicy::default();
        let lenient = RecognitionPolicy {
            accept_absent: true,
            ..RecognitionPolicy::default()
        };
        let absent = recognition(AttendanceStatus::Absent, 0.9);
        assert!(strict.rejection(&absent).is_some());
        assert!(lenient.rejection(&absent).is_none());
    }
}
