//! # Status messages and wildcard matching.
//!
//! A [`StatusMessage`] is one status event published by a backend process:
//! `(component, origin, code, text)`. The same type doubles as a **matcher**:
//! every unset field is a wildcard, so `StatusMessage::any().with_code(2241)`
//! matches any message carrying code `2241` regardless of who sent it.
//!
//! ## Code layout
//! ```text
//!   bus code = origin * 1000 + application code
//!
//!        2 2 4 1
//!        │ │ └┴── description (application defined)
//!        │ └───── severity (1 info, 2 success, 3 warning, 4 error, 5 failure)
//!        └─────── origin (1 default, 2 databridge, 3 controlbridge, 4 player, 5 sim node)
//! ```
//! Codes are always read as exactly four digits; `211` is treated as `0211`.
//!
//! ## Example
//! ```rust
//! use simvisor::{Origin, Severity, StatusMessage};
//!
//! let ev = StatusMessage::any()
//!     .with_component("next_player")
//!     .with_origin(Origin::Player)
//!     .with_code(4211)
//!     .with_text("init finished");
//!
//! let matcher = StatusMessage::any().with_origin(Origin::Player);
//! assert!(matcher.compatible(&ev));
//! assert_eq!(ev.severity(), Severity::Success);
//! ```

use std::fmt;
use std::sync::Arc;

/// Largest code representable with four digits.
const MAX_CODE: u32 = 9_999;

/// Kind of backend process a status message originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Origin {
    /// Generic component without a dedicated origin.
    Default = 1,
    /// Data bridge (UI data channel).
    DataBridge = 2,
    /// Control bridge (UI control channel).
    ControlBridge = 3,
    /// Recording player.
    Player = 4,
    /// User supplied simulation node.
    SimNode = 5,
}

impl Origin {
    /// All origins, in numeric order.
    pub const ALL: [Origin; 5] = [
        Origin::Default,
        Origin::DataBridge,
        Origin::ControlBridge,
        Origin::Player,
        Origin::SimNode,
    ];

    /// Numeric wire value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Resolves a numeric wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_u8() == value)
    }

    /// Canonical node name used by the backend for this origin.
    pub const fn node_name(self) -> &'static str {
        match self {
            Origin::Default => "default",
            Origin::DataBridge => "next_databridge",
            Origin::ControlBridge => "next_controlbridge",
            Origin::Player => "next_player",
            Origin::SimNode => "sim_node",
        }
    }

    /// Resolves a canonical node name back to its origin.
    pub fn from_node_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.node_name() == name)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

/// Severity encoded in the second digit of a four-digit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// No code, malformed code, or an unknown severity digit.
    Undefined = 0,
    /// Informational.
    Info = 1,
    /// Operation completed successfully.
    Success = 2,
    /// Degraded but operational.
    Warning = 3,
    /// Operation failed.
    Error = 4,
    /// Component failed.
    Failure = 5,
}

impl Severity {
    /// Severity of an optional code; `Undefined` for `None` or malformed codes.
    pub fn of(code: Option<u32>) -> Self {
        match code.and_then(normalize) {
            Some(c) => match (c / 100) % 10 {
                1 => Severity::Info,
                2 => Severity::Success,
                3 => Severity::Warning,
                4 => Severity::Error,
                5 => Severity::Failure,
                _ => Severity::Undefined,
            },
            None => Severity::Undefined,
        }
    }

    /// Short lowercase label (for logs).
    pub const fn as_label(self) -> &'static str {
        match self {
            Severity::Undefined => "undefined",
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Failure => "failure",
        }
    }
}

/// Validates a raw code as a four-digit code.
///
/// Returns `None` for negative values or values wider than four digits.
/// Leading zeros are implied: `211` normalizes to `211` and renders as `0211`.
pub fn normalize(code: impl TryInto<u32>) -> Option<u32> {
    code.try_into().ok().filter(|c| *c <= MAX_CODE)
}

/// Renders a code zero-padded to four digits (`211` → `"0211"`).
pub fn format_code(code: u32) -> String {
    format!("{code:04}")
}

/// One status event, or a wildcard pattern over status events.
///
/// Equality and hashing are structural over all four fields, including unset
/// ones, so two matchers are the same registry key only if they set the same
/// fields to the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StatusMessage {
    /// Component (instance) name of the publishing process.
    pub component: Option<Arc<str>>,
    /// Kind of the publishing process.
    pub origin: Option<Origin>,
    /// Bus code (`origin * 1000 + application code`).
    ///
    /// Stored as given. A value wider than four digits is kept so that a
    /// matcher built from it matches nothing valid; it reads as
    /// [`Severity::Undefined`] and has no [`code_str`](Self::code_str).
    /// Transport decoding rejects such codes before they reach the bus.
    pub code: Option<u32>,
    /// Free-form text.
    pub text: Option<Arc<str>>,
}

impl StatusMessage {
    /// Matcher with every field unset (matches everything).
    #[inline]
    pub fn any() -> Self {
        Self::default()
    }

    /// Creates a fully specified message.
    ///
    /// `code` is stored as given; see [`normalize`] for validation.
    pub fn new(
        component: impl Into<Arc<str>>,
        origin: Origin,
        code: u32,
        text: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            component: Some(component.into()),
            origin: Some(origin),
            code: Some(code),
            text: Some(text.into()),
        }
    }

    /// Creates a matcher from optional parts.
    pub fn matcher(component: Option<&str>, origin: Option<Origin>, code: Option<u32>) -> Self {
        Self {
            component: component.map(Arc::from),
            origin,
            code,
            text: None,
        }
    }

    /// Sets the component name.
    #[inline]
    pub fn with_component(mut self, component: impl Into<Arc<str>>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Sets the origin.
    #[inline]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Sets the bus code (stored as given, not normalized).
    #[inline]
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the text.
    #[inline]
    pub fn with_text(mut self, text: impl Into<Arc<str>>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Returns true if every field set on `self` equals the same field on `other`.
    ///
    /// Unset fields on `self` are wildcards. The relation is not symmetric:
    /// `any().compatible(x)` holds for every `x`, while `x.compatible(any())`
    /// holds only if `x` is itself a pure wildcard.
    pub fn compatible(&self, other: &StatusMessage) -> bool {
        fn field<T: PartialEq + ?Sized>(pattern: Option<&T>, value: Option<&T>) -> bool {
            match pattern {
                None => true,
                Some(p) => value == Some(p),
            }
        }

        field(self.component.as_deref(), other.component.as_deref())
            && field(self.origin.as_ref(), other.origin.as_ref())
            && field(self.code.as_ref(), other.code.as_ref())
            && field(self.text.as_deref(), other.text.as_deref())
    }

    /// True if any matcher in `matchers` is compatible with `self`.
    pub fn matches_any(&self, matchers: &[StatusMessage]) -> bool {
        matchers.iter().any(|m| m.compatible(self))
    }

    /// Severity derived from the code.
    #[inline]
    pub fn severity(&self) -> Severity {
        Severity::of(self.code)
    }

    /// Code rendered as four digits, if present and well-formed.
    pub fn code_str(&self) -> Option<String> {
        self.code.and_then(normalize).map(format_code)
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNDEFINED: &str = "undefined";
        let origin = self.origin.map_or(UNDEFINED, Origin::node_name);
        let code = self.code_str();
        write!(
            f,
            "origin={origin} component={} code={} text={}",
            self.component.as_deref().unwrap_or(UNDEFINED),
            code.as_deref().unwrap_or(UNDEFINED),
            self.text.as_deref().unwrap_or(UNDEFINED),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> StatusMessage {
        StatusMessage::new("next_player", Origin::Player, 4211, "init finished")
    }

    #[rstest]
    #[case(Some(4211), Severity::Success)]
    #[case(Some(211), Severity::Success)]
    #[case(Some(153), Severity::Info)]
    #[case(Some(2341), Severity::Warning)]
    #[case(Some(5411), Severity::Error)]
    #[case(Some(1511), Severity::Failure)]
    #[case(Some(1611), Severity::Undefined)]
    #[case(Some(7), Severity::Undefined)]
    #[case(Some(10_000), Severity::Undefined)]
    #[case(None, Severity::Undefined)]
    fn severity_from_second_digit(#[case] code: Option<u32>, #[case] expected: Severity) {
        assert_eq!(Severity::of(code), expected);
    }

    #[rstest]
    #[case(211_i64, Some(211))]
    #[case(0_i64, Some(0))]
    #[case(9_999_i64, Some(9_999))]
    #[case(10_000_i64, None)]
    #[case(-1_i64, None)]
    fn normalize_accepts_four_digits_only(#[case] raw: i64, #[case] expected: Option<u32>) {
        assert_eq!(normalize(raw), expected);
    }

    #[test]
    fn format_code_pads_leading_zeros() {
        assert_eq!(format_code(211), "0211");
        assert_eq!(format_code(5211), "5211");
    }

    #[test]
    fn wildcard_matches_everything() {
        assert!(StatusMessage::any().compatible(&sample()));
    }

    #[test]
    fn set_fields_must_be_equal() {
        let ev = sample();
        assert!(
            StatusMessage::any()
                .with_component("next_player")
                .compatible(&ev)
        );
        assert!(!StatusMessage::any().with_component("other").compatible(&ev));
        assert!(!StatusMessage::any().with_code(4212).compatible(&ev));
        assert!(!StatusMessage::any().with_text("nope").compatible(&ev));
        assert!(
            !StatusMessage::any()
                .with_origin(Origin::SimNode)
                .compatible(&ev)
        );
    }

    #[test]
    fn set_field_does_not_match_unset_field() {
        let partial = StatusMessage::any().with_code(4211);
        assert!(!StatusMessage::any().with_text("x").compatible(&partial));
    }

    #[test]
    fn equality_is_structural_including_unset_fields() {
        let a = StatusMessage::any().with_code(211);
        let b = StatusMessage::any().with_code(211);
        let c = StatusMessage::any().with_code(211).with_text("x");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn origin_round_trips_through_wire_value_and_node_name() {
        for origin in Origin::ALL {
            assert_eq!(Origin::from_u8(origin.as_u8()), Some(origin));
            assert_eq!(Origin::from_node_name(origin.node_name()), Some(origin));
        }
        assert_eq!(Origin::from_u8(0), None);
        assert_eq!(Origin::from_u8(6), None);
    }

    #[test]
    fn display_marks_unset_fields() {
        let text = StatusMessage::any().with_code(211).to_string();
        assert_eq!(
            text,
            "origin=undefined component=undefined code=0211 text=undefined"
        );
    }

    #[test]
    fn oversized_codes_stay_out_of_range() {
        let ev = StatusMessage::any().with_code(12_345);
        assert_eq!(ev.code, Some(12_345));
        assert_eq!(ev.code_str(), None);
        assert_eq!(ev.severity(), Severity::Undefined);
        assert!(!ev.compatible(&StatusMessage::any().with_code(2345)));
    }
}
