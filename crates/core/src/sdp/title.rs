use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::SdpConfig;

/// Session-level part of an SDP document: everything before the first
/// `m=` line.
///
/// ```text
/// v=0
/// o=- 1383190487994921 1 IN IP4 0.0.0.0
/// s=RTSP Session
/// i=Live Stream
/// c=IN IP4 0.0.0.0
/// t=0 0
/// a=range:npt=0-        ← live; "npt=0-<seconds>" for on-demand
/// a=control:*
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleSdp {
    text: String,
}

impl TitleSdp {
    /// Build from caller-supplied `key=value` lines, or from
    /// [`SdpConfig::default`] when `header` is empty.
    ///
    /// `duration` is the on-demand length in seconds; `0` (or less) marks a
    /// live stream.
    pub fn new(duration: f32, header: &BTreeMap<String, String>, version: u32) -> Self {
        if header.is_empty() {
            return Self::with_config(duration, &SdpConfig::default(), version);
        }
        let lines = header.iter().map(|(k, v)| format!("{k}={v}"));
        Self::render(duration, version, lines)
    }

    pub fn with_config(duration: f32, config: &SdpConfig, version: u32) -> Self {
        Self::render(duration, version, config.lines())
    }

    fn render(duration: f32, version: u32, lines: impl IntoIterator<Item = String>) -> Self {
        let mut text = format!("v={version}\r\n");
        for line in lines {
            text.push_str(&line);
            text.push_str("\r\n");
        }

        // Also catches NaN.
        if duration > 0.0 {
            let _ = write!(text, "a=range:npt=0-{duration}\r\n");
        } else {
            text.push_str("a=range:npt=0-\r\n");
        }
        text.push_str("a=control:*\r\n");

        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_live_title() {
        let title = TitleSdp::new(0.0, &BTreeMap::new(), 0);
        assert_eq!(
            title.text(),
            "v=0\r\n\
             o=- 1383190487994921 1 IN IP4 0.0.0.0\r\n\
             s=RTSP Session\r\n\
             i=Live Stream\r\n\
             c=IN IP4 0.0.0.0\r\n\
             t=0 0\r\n\
             a=range:npt=0-\r\n\
             a=control:*\r\n"
        );
    }

    #[test]
    fn on_demand_range() {
        let title = TitleSdp::new(12.5, &BTreeMap::new(), 0);
        assert!(title.text().contains("a=range:npt=0-12.5\r\n"));

        let title = TitleSdp::new(30.0, &BTreeMap::new(), 0);
        assert!(title.text().contains("a=range:npt=0-30\r\n"));
    }

    #[test]
    fn negative_and_nan_durations_are_live() {
        for d in [-1.0, f32::NAN] {
            let title = TitleSdp::new(d, &BTreeMap::new(), 0);
            assert!(title.text().contains("a=range:npt=0-\r\n"));
        }
    }

    #[test]
    fn custom_header_replaces_defaults_in_key_order() {
        let mut header = BTreeMap::new();
        header.insert("s".to_string(), "Camera 1".to_string());
        header.insert("o".to_string(), "- 1 1 IN IP4 10.0.0.1".to_string());
        let title = TitleSdp::new(0.0, &header, 1);
        assert_eq!(
            title.text(),
            "v=1\r\n\
             o=- 1 1 IN IP4 10.0.0.1\r\n\
             s=Camera 1\r\n\
             a=range:npt=0-\r\n\
             a=control:*\r\n"
        );
    }

    #[test]
    fn control_wildcard_is_last() {
        let title = TitleSdp::new(5.0, &BTreeMap::new(), 0);
        assert!(title.text().ends_with("a=control:*\r\n"));
    }
}
