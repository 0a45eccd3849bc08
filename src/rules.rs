// Rule Evaluator
//
// Pure decision logic: given an image's rendered geometry and classes, the
// current settings snapshot and the page hostname, decide whether the image
// should carry the blur marker.

use serde::{Deserialize, Serialize};

use crate::settings::{whitelist, Settings};

/// Rendered bounding box in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Dimensions rounded to whole pixels, halves rounding up
    pub fn rounded(&self) -> (u32, u32) {
        (round_px(self.width), round_px(self.height))
    }
}

fn round_px(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        (value + 0.5).floor() as u32
    } else {
        0
    }
}

/// What the evaluator needs to know about one image
#[derive(Debug, Clone, Copy)]
pub struct ImageFacts<'a> {
    pub rect: Rect,
    pub classes: &'a [String],
}

/// Settings snapshot plus the session whitelist, owned by the page watcher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlurContext {
    pub settings: Settings,
    pub temp_whitelist: Vec<String>,
}

impl BlurContext {
    pub fn new(settings: Settings, temp_whitelist: Vec<String>) -> Self {
        Self {
            settings,
            temp_whitelist,
        }
    }

    pub fn is_temp_whitelisted(&self, hostname: &str) -> bool {
        whitelist::contains(&self.temp_whitelist, hostname)
    }

    /// Whether blurring applies to this site at all
    pub fn is_active_for(&self, hostname: &str) -> bool {
        self.settings.enabled
            && !self.settings.is_whitelisted(hostname)
            && !self.is_temp_whitelisted(hostname)
    }
}

/// Why an image is left unblurred
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BelowMinimumSize { width: u32, height: u32 },
    ExcludedClass(String),
    Disabled,
    Whitelisted,
    TemporarilyWhitelisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Blur,
    Skip(SkipReason),
    /// Not laid out yet; re-checked once the image loads
    Deferred,
}

impl Decision {
    pub fn should_blur(&self) -> bool {
        matches!(self, Decision::Blur)
    }
}

/// Size and class checks against the current settings
pub fn meets_image_criteria(image: &ImageFacts<'_>, settings: &Settings) -> Decision {
    let (width, height) = image.rect.rounded();

    if width == 0 || height == 0 {
        return Decision::Deferred;
    }

    let min = settings.min_image_size;
    if min > 0 && (width < min || height < min) {
        return Decision::Skip(SkipReason::BelowMinimumSize { width, height });
    }

    if let Some(pattern) = excluded_class(image.classes, &settings.exclude_classes) {
        return Decision::Skip(SkipReason::ExcludedClass(pattern.to_string()));
    }

    Decision::Blur
}

/// First exclusion pattern contained (case-insensitively) in any class token
fn excluded_class<'p>(classes: &[String], patterns: &'p [String]) -> Option<&'p str> {
    if patterns.is_empty() || classes.is_empty() {
        return None;
    }

    let tokens: Vec<String> = classes.iter().map(|c| c.to_lowercase()).collect();
    patterns
        .iter()
        .find(|pattern| {
            let pattern = pattern.to_lowercase();
            tokens.iter().any(|token| token.contains(&pattern))
        })
        .map(|p| p.as_str())
}

/// Full decision for one image
pub fn evaluate(image: &ImageFacts<'_>, context: &BlurContext, hostname: &str) -> Decision {
    match meets_image_criteria(image, &context.settings) {
        Decision::Blur => {}
        other => return other,
    }

    if !context.settings.enabled {
        Decision::Skip(SkipReason::Disabled)
    } else if context.settings.is_whitelisted(hostname) {
        Decision::Skip(SkipReason::Whitelisted)
    } else if context.is_temp_whitelisted(hostname) {
        Decision::Skip(SkipReason::TemporarilyWhitelisted)
    } else {
        Decision::Blur
    }
}

pub fn should_blur(image: &ImageFacts<'_>, context: &BlurContext, hostname: &str) -> bool {
    evaluate(image, context, hostname).should_blur()
}
