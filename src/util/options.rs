use crate::policy::cms::free_chunk::HeaderMode;
use crate::util::constants::LOG_BYTES_IN_MBYTE;
use std::default::Default;
use strum_macros::EnumString;

/// How to decide whether free chunks are tagged in the mark word (narrow headers) or in the
/// `prev` link (wide headers).
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString)]
pub enum HeaderModeSelector {
    /// Ask the memory collaborator (`MemoryAccess::is_compressed_header_mode`).
    Auto,
    Wide,
    Narrow,
}

impl HeaderModeSelector {
    /// Resolve the selector against what the target reports.
    pub fn resolve(self, target_reports_compressed: bool) -> HeaderMode {
        match self {
            HeaderModeSelector::Auto if target_reports_compressed => HeaderMode::Narrow,
            HeaderModeSelector::Auto => HeaderMode::Wide,
            HeaderModeSelector::Wide => HeaderMode::Wide,
            HeaderModeSelector::Narrow => HeaderMode::Narrow,
        }
    }
}

/// The default threshold above which a disagreement between the two used-bytes estimates is
/// logged as a warning.
pub const DEFAULT_DISCREPANCY_WARN_BYTES: usize = 1 << LOG_BYTES_IN_MBYTE;

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($name: $type[$validator] = $default),*);
    ];
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        #[derive(Clone, Debug)]
        pub struct Options {
            $(pub $name: $type),*
        }
        impl Options {
            /// Set an option from its snake case name. Returns whether the value was accepted.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling set_from_str()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            eprintln!("Warn: unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        eprintln!("Warn: unable to set {}={:?}. Cant parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => {
                        eprintln!("Warn: unknown option {}", s);
                        false
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Options {
                    $($name: $default),*
                };

                // If we have env vars that start with CMS_INSPECT_ and match any option (such as CMS_INSPECT_MAX_SCAN_STEPS),
                // we set the option to its value (if it is a valid value). Otherwise, use the default value.
                const PREFIX: &str = "CMS_INSPECT_";
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { options.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
                options
            }
        }
    ]
}
options! {
    // Upper bound on the number of blocks a single live region scan visits. 0 means unlimited.
    max_scan_steps:         usize              [always_valid] = 0,
    // Poll the cancellation source once every this many blocks.
    cancel_poll_interval:   usize              [|v: &usize| *v > 0] = 1,
    // Warn when the region-sum and capacity-minus-free estimates of used bytes differ by more than this.
    discrepancy_warn_bytes: usize              [always_valid] = DEFAULT_DISCREPANCY_WARN_BYTES,
    // Free chunk tagging. Auto follows the target's compressed-header report.
    header_mode:            HeaderModeSelector [always_valid] = HeaderModeSelector::Auto,
}

impl Options {
    /// Set an option from its camel case name, e.g. `maxScanSteps`.
    pub fn set_from_camelcase_str(&mut self, s: &str, val: &str) -> bool {
        trace!("Trying to process option pair: ({}, {})", s, val);

        let mut sr = String::with_capacity(s.len());
        for c in s.chars() {
            if c.is_uppercase() {
                sr.push('_');
                for c in c.to_lowercase() {
                    sr.push(c);
                }
            } else {
                sr.push(c)
            }
        }

        let result = self.set_from_str(sr.as_str(), val);

        trace!("Trying to process option pair: ({})", sr);

        if result {
            trace!("Validation passed");
        } else {
            trace!("Validation failed")
        }
        result
    }

    /// The step limit of a scan, or `None` if unlimited.
    pub fn scan_step_limit(&self) -> Option<usize> {
        (self.max_scan_steps != 0).then_some(self.max_scan_steps)
    }
}
