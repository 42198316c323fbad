//! Parser options adapter
//!
//! Shapes a normalized [`Invocation`] into the frontend's configuration. The
//! mapping is pure: macro entries become `NAME` or `NAME=VALUE` tokens,
//! include paths are copied verbatim, and the fixed build settings (dialect,
//! target, extension switches, function bodies, sentinel define) come from
//! [`AdapterSettings`] rather than from the captured command.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compilation::{TargetCpu, TargetInfo};
use crate::config::invocation::Invocation;

/// C language revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    C89,
    #[default]
    C99,
    C11,
}

impl Dialect {
    /// Value of `__STDC_VERSION__`, if the revision defines one
    pub fn stdc_version(self) -> Option<&'static str> {
        match self {
            Dialect::C89 => None,
            Dialect::C99 => Some("199901L"),
            Dialect::C11 => Some("201112L"),
        }
    }
}

/// Everything the frontend needs to parse one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,
    pub include_folders: Vec<PathBuf>,
    pub target_cpu: TargetCpu,
    /// MSVC ABI: LLP64 data model and the `_MSC_VER` family of predefines
    pub msvc: bool,
    pub dialect: Dialect,
    /// Extra compiler-style switches; `-fms-extensions` enables the MSVC keywords
    pub additional_arguments: Vec<String>,
    pub parse_as_cpp: bool,
    pub parse_system_includes: bool,
    pub parse_comments: bool,
    pub function_bodies: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            defines: Vec::new(),
            include_folders: Vec::new(),
            target_cpu: TargetCpu::X86_64,
            msvc: false,
            dialect: Dialect::C99,
            additional_arguments: Vec::new(),
            parse_as_cpp: false,
            parse_system_includes: false,
            parse_comments: false,
            function_bodies: true,
        }
    }
}

impl ParserOptions {
    pub fn ms_extensions(&self) -> bool {
        self.msvc
            || self
                .additional_arguments
                .iter()
                .any(|arg| arg == "-fms-extensions" || arg == "-fms-compatibility")
    }

    pub fn target_info(&self) -> TargetInfo {
        TargetInfo::new(self.target_cpu, self.msvc)
    }

    /// Build the options for one invocation
    pub fn from_invocation(invocation: &Invocation, settings: &AdapterSettings) -> ParserOptions {
        let mut defines = invocation.define_tokens();
        defines.push(settings.sentinel_define.clone());

        ParserOptions {
            defines,
            include_folders: invocation.include.iter().map(PathBuf::from).collect(),
            target_cpu: settings.target_cpu,
            msvc: settings.msvc,
            dialect: settings.dialect,
            additional_arguments: settings.additional_arguments.clone(),
            parse_as_cpp: false,
            parse_system_includes: settings.parse_system_includes,
            parse_comments: false,
            function_bodies: settings.function_bodies,
        }
    }
}

/// The fixed part of the parser configuration, identical for every file of
/// a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Always defined; marks artifacts produced with these fixed settings
    pub sentinel_define: String,
    pub target_cpu: TargetCpu,
    pub msvc: bool,
    pub dialect: Dialect,
    pub additional_arguments: Vec<String>,
    pub function_bodies: bool,
    pub parse_system_includes: bool,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        AdapterSettings {
            sentinel_define: "AST_DUMP_FIXED".to_string(),
            target_cpu: TargetCpu::X86_64,
            msvc: true,
            dialect: Dialect::C99,
            additional_arguments: [
                "-fno-complete-member-pointers",
                "-std=c99",
                "-fms-extensions",
                "-fms-compatibility",
                "-fms-compatibility-version=19",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            function_bodies: true,
            parse_system_includes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use indexmap::IndexMap;

    fn sample() -> Invocation {
        Invocation {
            include: vec!["/src/main".to_string(), "/src/Zend".to_string()],
            input: vec!["/src/a.c".to_string()],
            define: IndexMap::from([
                ("NDEBUG".to_string(), None),
                ("PHP_WIN32".to_string(), Some("1".to_string())),
            ]),
            ..Invocation::default()
        }
    }

    #[test]
    fn test_defines_and_sentinel() {
        let options = ParserOptions::from_invocation(&sample(), &AdapterSettings::default());
        assert_eq!(options.defines, vec!["NDEBUG", "PHP_WIN32=1", "AST_DUMP_FIXED"]);
    }

    #[test]
    fn test_includes_copied_verbatim() {
        let options = ParserOptions::from_invocation(&sample(), &AdapterSettings::default());
        assert_eq!(
            options.include_folders,
            vec![PathBuf::from("/src/main"), PathBuf::from("/src/Zend")]
        );
    }

    #[test]
    fn test_fixed_settings() {
        let options = ParserOptions::from_invocation(&sample(), &AdapterSettings::default());
        assert_eq!(options.dialect, Dialect::C99);
        assert_eq!(options.target_cpu, TargetCpu::X86_64);
        assert!(options.function_bodies);
        assert!(options.ms_extensions());
        assert!(!options.parse_as_cpp);
        assert!(!options.parse_system_includes);
        assert!(options.additional_arguments.contains(&"-std=c99".to_string()));
    }

    #[test]
    fn test_sentinel_is_always_last() {
        let settings = AdapterSettings {
            sentinel_define: "DUMP_RUN=2".to_string(),
            ..AdapterSettings::default()
        };
        let options = ParserOptions::from_invocation(&Invocation::default(), &settings);
        assert_eq!(options.defines, vec!["DUMP_RUN=2"]);

        let options = ParserOptions::from_invocation(&sample(), &settings);
        assert_eq!(options.defines.last().map(String::as_str), Some("DUMP_RUN=2"));
    }

    #[test]
    fn test_defines_keep_document_order() {
        let invocation: Invocation =
            serde_json::from_str(r#"{"define": {"ZEND_DEBUG": "0", "APACHE": null, "NDEBUG": null}}"#).unwrap();
        let options = ParserOptions::from_invocation(&invocation, &AdapterSettings::default());
        assert_eq!(options.defines, vec!["ZEND_DEBUG=0", "APACHE", "NDEBUG", "AST_DUMP_FIXED"]);
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: AdapterSettings =
            serde_json::from_str(r#"{"target_cpu": "x86", "msvc": false}"#).unwrap();
        assert_eq!(settings.target_cpu, TargetCpu::X86);
        assert!(!settings.msvc);
        assert_eq!(settings.sentinel_define, "AST_DUMP_FIXED");
    }
}
