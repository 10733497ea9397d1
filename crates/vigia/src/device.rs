//! Device matrix: named viewport/user-agent profiles.
//!
//! A scenario is run once per selected profile. The standard catalog covers
//! two phones, a tablet in both orientations and two desktop sizes.

use crate::context::BrowsingContext;
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a new viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if viewport is in landscape orientation
    #[must_use]
    pub const fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A named form factor a scenario can be sized to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Profile name (e.g., "mobile-small")
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Device pixel ratio
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: f64,
    /// Emulate a mobile device (meta viewport, touch)
    #[serde(default)]
    pub mobile: bool,
}

const fn default_scale_factor() -> f64 {
    1.0
}

impl DeviceProfile {
    /// Create a desktop-style profile without a user agent override
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            user_agent: None,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set device scale factor
    #[must_use]
    pub const fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }

    /// Set mobile mode
    #[must_use]
    pub const fn with_mobile(mut self, mobile: bool) -> Self {
        self.mobile = mobile;
        self
    }

    /// Viewport described by this profile
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    /// Reject profiles with a zero dimension
    pub fn validate(&self) -> HarnessResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(HarnessError::InvalidProfile {
                name: self.name.clone(),
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Configure a browsing context for this profile.
    ///
    /// Safe to call repeatedly on the same context: viewport settings are
    /// replaced, not accumulated.
    pub async fn apply<C: BrowsingContext + ?Sized>(&self, context: &mut C) -> HarnessResult<()> {
        self.validate()?;
        context
            .set_viewport(self.viewport(), self.device_scale_factor, self.mobile)
            .await?;
        if let Some(ref ua) = self.user_agent {
            context.set_user_agent(ua).await?;
        }
        tracing::debug!(device = %self.name, viewport = %self.viewport(), "applied device profile");
        Ok(())
    }
}

/// Ordered catalog of device profiles
#[derive(Debug, Clone, Default)]
pub struct DeviceMatrix {
    profiles: Vec<DeviceProfile>,
}

impl DeviceMatrix {
    /// Create an empty matrix
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog
    #[must_use]
    pub fn standard() -> Self {
        let mut matrix = Self::new();
        for profile in [
            Self::mobile_small(),
            Self::mobile_large(),
            Self::tablet_portrait(),
            Self::tablet_landscape(),
            Self::desktop_small(),
            Self::desktop_large(),
        ] {
            matrix.profiles.push(profile);
        }
        matrix
    }

    /// Add a profile, replacing any profile with the same name
    pub fn register(&mut self, profile: DeviceProfile) -> HarnessResult<()> {
        profile.validate()?;
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == profile.name) {
            *existing = profile;
        } else {
            self.profiles.push(profile);
        }
        Ok(())
    }

    /// All profiles in registration order
    pub fn profiles(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.profiles.iter()
    }

    /// Look up a profile by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeviceProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Sub-matrix with the named profiles, in the order given
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> HarnessResult<Self> {
        let mut selected = Self::new();
        for name in names {
            let profile = self
                .get(name.as_ref())
                .ok_or_else(|| HarnessError::UnknownDevice {
                    name: name.as_ref().to_string(),
                })?;
            selected.profiles.push(profile.clone());
        }
        Ok(selected)
    }

    /// Number of profiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the matrix is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    // ========================================================================
    // Standard catalog
    // ========================================================================

    /// Small phone (iPhone SE class)
    #[must_use]
    pub fn mobile_small() -> DeviceProfile {
        DeviceProfile::new("mobile-small", 375, 667)
            .with_user_agent(IPHONE_UA)
            .with_device_scale_factor(2.0)
            .with_mobile(true)
    }

    /// Large phone (iPhone 15 Pro class)
    #[must_use]
    pub fn mobile_large() -> DeviceProfile {
        DeviceProfile::new("mobile-large", 393, 852)
            .with_user_agent(IPHONE_UA)
            .with_device_scale_factor(3.0)
            .with_mobile(true)
    }

    /// Tablet held upright
    #[must_use]
    pub fn tablet_portrait() -> DeviceProfile {
        DeviceProfile::new("tablet-portrait", 768, 1024)
            .with_user_agent(IPAD_UA)
            .with_device_scale_factor(2.0)
            .with_mobile(true)
    }

    /// Tablet on its side
    #[must_use]
    pub fn tablet_landscape() -> DeviceProfile {
        DeviceProfile::new("tablet-landscape", 1024, 768)
            .with_user_agent(IPAD_UA)
            .with_device_scale_factor(2.0)
            .with_mobile(true)
    }

    /// Laptop screen
    #[must_use]
    pub fn desktop_small() -> DeviceProfile {
        DeviceProfile::new("desktop-small", 1280, 800)
    }

    /// Full HD monitor
    #[must_use]
    pub fn desktop_large() -> DeviceProfile {
        DeviceProfile::new("desktop-large", 1920, 1080)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockContext;
    use proptest::prelude::*;

    mod profile_tests {
        use super::*;

        #[test]
        fn test_new_defaults() {
            let profile = DeviceProfile::new("kiosk", 1080, 1920);
            assert_eq!(profile.viewport(), Viewport::new(1080, 1920));
            assert!(profile.user_agent.is_none());
            assert!(!profile.mobile);
        }

        #[test]
        fn test_zero_dimension_rejected() {
            let err = DeviceProfile::new("broken", 0, 600).validate().unwrap_err();
            assert!(matches!(err, HarnessError::InvalidProfile { width: 0, .. }));
        }

        #[tokio::test]
        async fn test_apply_sets_viewport_width() {
            let mut ctx = MockContext::new();
            DeviceProfile::new("phone", 375, 667).apply(&mut ctx).await.unwrap();
            assert_eq!(ctx.viewport().await.unwrap().width, 375);
        }

        #[tokio::test]
        async fn test_last_applied_profile_wins() {
            let mut ctx = MockContext::new();
            DeviceMatrix::desktop_large().apply(&mut ctx).await.unwrap();
            DeviceMatrix::mobile_small().apply(&mut ctx).await.unwrap();
            assert_eq!(ctx.viewport().await.unwrap(), Viewport::new(375, 667));
            assert_eq!(ctx.user_agent(), Some(IPHONE_UA.to_string()));
        }

        #[tokio::test]
        async fn test_invalid_profile_leaves_context_untouched() {
            let mut ctx = MockContext::new();
            DeviceMatrix::desktop_small().apply(&mut ctx).await.unwrap();
            let result = DeviceProfile::new("broken", 800, 0).apply(&mut ctx).await;
            assert!(result.is_err());
            assert_eq!(ctx.viewport().await.unwrap(), Viewport::new(1280, 800));
        }
    }

    mod matrix_tests {
        use super::*;

        #[test]
        fn test_standard_catalog() {
            let matrix = DeviceMatrix::standard();
            let names: Vec<_> = matrix.profiles().map(|p| p.name.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "mobile-small",
                    "mobile-large",
                    "tablet-portrait",
                    "tablet-landscape",
                    "desktop-small",
                    "desktop-large"
                ]
            );
            assert_eq!(
                matrix.get("tablet-landscape").unwrap().viewport(),
                Viewport::new(1024, 768),
            );
        }

        #[test]
        fn test_register_replaces_same_name() {
            let mut matrix = DeviceMatrix::standard();
            matrix
                .register(DeviceProfile::new("desktop-small", 1366, 768))
                .unwrap();
            assert_eq!(matrix.len(), 6);
            assert_eq!(matrix.get("desktop-small").unwrap().width, 1366);
        }

        #[test]
        fn test_register_rejects_zero() {
            let mut matrix = DeviceMatrix::new();
            assert!(matrix.register(DeviceProfile::new("bad", 0, 0)).is_err());
            assert!(matrix.is_empty());
        }

        #[test]
        fn test_select_keeps_requested_order() {
            let matrix = DeviceMatrix::standard();
            let selected = matrix.select(&["desktop-large", "mobile-small"]).unwrap();
            let names: Vec<_> = selected.profiles().map(|p| p.name.clone()).collect();
            assert_eq!(names, vec!["desktop-large", "mobile-small"]);
        }

        #[test]
        fn test_select_unknown() {
            let err = DeviceMatrix::standard().select(&["watch"]).unwrap_err();
            assert!(matches!(err, HarnessError::UnknownDevice { .. }));
        }
    }

    proptest! {
        #[test]
        fn prop_apply_round_trips_viewport(width in 1u32..4000, height in 1u32..4000) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let reported = rt.block_on(async {
                let mut ctx = MockContext::new();
                DeviceProfile::new("p", width, height).apply(&mut ctx).await.unwrap();
                ctx.viewport().await.unwrap()
            });
            prop_assert_eq!(reported.width, width);
            prop_assert_eq!(reported.height, height);
        }
    }
}
