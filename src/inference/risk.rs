//! Wildfire risk categories derived from the predicted probability

use serde::{Deserialize, Serialize};

/// Probability at or above which a prediction is High risk
pub const HIGH_RISK_THRESHOLD: f32 = 0.70;

/// Probability at or above which a prediction is Medium risk
pub const MEDIUM_RISK_THRESHOLD: f32 = 0.40;

/// Probability at or above which a high-confidence alert is raised
pub const ALERT_THRESHOLD: f32 = 0.90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a wildfire probability; thresholds are inclusive
    pub fn from_probability(p: f32) -> Self {
        if p >= HIGH_RISK_THRESHOLD {
            Self::High
        } else if p >= MEDIUM_RISK_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "HIGH RISK",
            Self::Medium => "MEDIUM RISK",
            Self::Low => "LOW RISK",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "#e63946",
            Self::Medium => "#f77f00",
            Self::Low => "#06d6a0",
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Self::High => &[
                "⚠️ Immediate evacuation may be required",
                "🚒 Deploy firefighting resources to standby",
                "📢 Issue public alerts and warnings",
                "🚫 Restrict access to high-risk zones",
                "📊 Monitor continuously with satellite updates",
            ],
            Self::Medium => &[
                "👁️ Monitor area closely for changes",
                "🌲 Implement vegetation management",
                "🧯 Ensure fire suppression equipment ready",
                "📋 Review evacuation plans",
                "🔔 Set up early warning systems",
            ],
            Self::Low => &[
                "✅ Area appears safe from wildfire",
                "🌍 Maintain standard monitoring protocols",
                "🌱 Continue sustainable land management",
                "📈 Safe for development and activities",
                "💚 Environmentally stable zone",
            ],
        }
    }

    /// One-line operational summary for the category
    pub fn action(&self) -> &'static str {
        match self {
            Self::High => {
                "Alert insurance clients, increase premium or deny coverage for new policies in this zone"
            }
            Self::Medium => "Flag for regular monitoring, apply standard risk pricing",
            Self::Low => "Safe for standard coverage, competitive premium pricing available",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Alert text when the wildfire probability is at least [`ALERT_THRESHOLD`]
pub fn high_confidence_alert(p: f32) -> Option<String> {
    (p >= ALERT_THRESHOLD).then(|| {
        format!(
            "⚠️ High Confidence Alert: Model is {:.1}% confident. Immediate action recommended.",
            p * 100.0
        )
    })
}
