use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Sentinel for `max_depth` meaning the walk has no depth limit
pub const UNLIMITED_DEPTH: i32 = -1;

/// Options controlling how a lock scan walks a directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(default, setter(into))]
pub struct LockingProcessesOptions {
    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: bool,

    /// Deepest directory level to open, where the scanned root is level 0.
    /// `-1` means unlimited.
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,

    /// Skip directories whose contents cannot be listed instead of failing the scan
    #[serde(default = "default_continue_on_access_denied")]
    pub continue_on_access_denied: bool,

    /// Read command line and working directory out of each locking process
    #[serde(default)]
    pub collect_process_parameters: bool,
}

impl Default for LockingProcessesOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: default_max_depth(),
            continue_on_access_denied: default_continue_on_access_denied(),
            collect_process_parameters: false,
        }
    }
}

impl LockingProcessesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> LockingProcessesOptionsBuilder {
        LockingProcessesOptionsBuilder::default()
    }

    /// Walk the whole tree below the scanned directory
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    /// Only the files directly inside the scanned directory
    pub fn top_level_only() -> Self {
        Self {
            recursive: false,
            max_depth: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_depth < UNLIMITED_DEPTH {
            return Err(anyhow::anyhow!(
                "max_depth must be -1 (unlimited) or a non-negative depth, got {}",
                self.max_depth
            ));
        }

        Ok(())
    }

    /// Whether a directory at `depth` may be opened
    pub fn allows_depth(&self, depth: usize) -> bool {
        match usize::try_from(self.max_depth) {
            Ok(max) => depth <= max,
            Err(_) => true,
        }
    }
}

fn default_max_depth() -> i32 {
    UNLIMITED_DEPTH
}
fn default_continue_on_access_denied() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = LockingProcessesOptions::default();
        assert!(options.validate().is_ok());
        assert!(!options.recursive);
        assert_eq!(options.max_depth, UNLIMITED_DEPTH);
        assert!(options.continue_on_access_denied);
        assert!(!options.collect_process_parameters);
    }

    #[test]
    fn test_builder() {
        let options = LockingProcessesOptions::builder()
            .recursive(true)
            .max_depth(2)
            .continue_on_access_denied(false)
            .build()
            .unwrap();

        assert!(options.recursive);
        assert_eq!(options.max_depth, 2);
        assert!(!options.continue_on_access_denied);
        assert!(!options.collect_process_parameters);
    }

    #[test]
    fn test_depth_limits() {
        let unlimited = LockingProcessesOptions::recursive();
        assert!(unlimited.allows_depth(0));
        assert!(unlimited.allows_depth(10_000));

        let top = LockingProcessesOptions::top_level_only();
        assert!(top.allows_depth(0));
        assert!(!top.allows_depth(1));

        let two = LockingProcessesOptions {
            max_depth: 2,
            ..Default::default()
        };
        assert!(two.allows_depth(2));
        assert!(!two.allows_depth(3));
    }

    #[test]
    fn test_invalid_depth() {
        let options = LockingProcessesOptions {
            max_depth: -5,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: LockingProcessesOptions =
            serde_json::from_str(r#"{"recursive": true, "maxDepth": 3}"#).unwrap();
        assert!(options.recursive);
        assert_eq!(options.max_depth, 3);
        assert!(options.continue_on_access_denied);

        let empty: LockingProcessesOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, LockingProcessesOptions::default());
    }
}
