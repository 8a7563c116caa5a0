//! GLSL composition: `#include` resolution and feature toggles.

use std::collections::{HashMap, HashSet};

use uniforge_core::profiling::profile_scope;

use crate::error::ShaderError;

use super::ShaderStage;

/// Shader composer for resolving includes and toggling shader features.
///
/// # Include Syntax
///
/// ```glsl
/// #include "common/lighting.glsl"
/// ```
///
/// # Features
///
/// A shader lists the optional features it supports with
///
/// ```glsl
/// #pragma feature NORMAL_MAPPING
/// ```
///
/// and guards the code with `#ifdef NORMAL_MAPPING`. When a composed shader
/// requests the feature, the composer inserts `#define NORMAL_MAPPING` right
/// after the `#version` line. The stage macro (`VERTEX`, `GEOMETRY`,
/// `FRAGMENT` or `COMPUTE`) is always defined.
#[derive(Debug, Default)]
pub struct ShaderComposer {
    /// Registered include sources: path -> source text.
    includes: HashMap<String, String>,
}

impl ShaderComposer {
    /// Create a new empty shader composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single include source.
    ///
    /// The path is what appears in `#include "path"` directives.
    pub fn register_include(&mut self, path: &str, source: &str) {
        self.includes.insert(path.to_string(), source.to_string());
    }

    /// Whether an include is registered under `path`.
    pub fn has_include(&self, path: &str) -> bool {
        self.includes.contains_key(path)
    }

    /// Resolve `#include` directives without any other processing.
    pub fn resolve_glsl(&self, source: &str) -> Result<String, ShaderError> {
        let mut included = HashSet::new();
        self.resolve_includes(source, &mut included)
    }

    /// Features a source declares with `#pragma feature`, in order of appearance.
    pub fn declared_features(source: &str) -> Vec<String> {
        let mut features = Vec::new();
        for line in source.lines() {
            if let Some(name) = parse_feature_pragma(line.trim()) {
                if !features.iter().any(|f| f == name) {
                    features.push(name.to_string());
                }
            }
        }
        features
    }

    /// Compose a GLSL stage: resolve includes, drop feature pragmas and
    /// define the stage macro plus every requested feature the source declares.
    ///
    /// Requested features the source does not declare are ignored with a
    /// warning.
    pub fn compose(
        &self,
        source: &str,
        stage: ShaderStage,
        features: &[&str],
    ) -> Result<String, ShaderError> {
        profile_scope!("shader_compose");

        let resolved = self.resolve_glsl(source)?;
        let declared = Self::declared_features(&resolved);

        let mut defines = vec![stage.define().to_string()];
        for feature in features {
            if declared.iter().any(|d| d == feature) {
                defines.push((*feature).to_string());
            } else {
                log::warn!("Feature '{feature}' is not declared by the {stage} shader, ignoring");
            }
        }

        let mut composed = String::with_capacity(resolved.len() + defines.len() * 24);
        let mut defines_written = false;

        for line in resolved.lines() {
            let trimmed = line.trim();
            if parse_feature_pragma(trimmed).is_some() {
                // Keep line numbers stable for driver logs
                composed.push('\n');
                continue;
            }

            composed.push_str(line);
            composed.push('\n');

            if !defines_written && trimmed.starts_with("#version") {
                write_defines(&mut composed, &defines);
                defines_written = true;
            }
        }

        if !defines_written {
            let mut prefixed = String::with_capacity(composed.len() + defines.len() * 24);
            write_defines(&mut prefixed, &defines);
            prefixed.push_str(&composed);
            composed = prefixed;
        }

        Ok(composed)
    }

    /// Resolve `#include "path"` directives recursively.
    fn resolve_includes(
        &self,
        source: &str,
        included: &mut HashSet<String>,
    ) -> Result<String, ShaderError> {
        let mut result = String::with_capacity(source.len());

        for line in source.lines() {
            let trimmed = line.trim();
            if let Some(path) = parse_include_directive(trimmed) {
                // Skip if already included (prevent double-inclusion)
                if !included.insert(path.to_string()) {
                    continue;
                }

                let include_source =
                    self.includes
                        .get(path)
                        .ok_or_else(|| ShaderError::IncludeNotFound {
                            path: path.to_string(),
                        })?;

                let resolved = self.resolve_includes(include_source, included)?;
                result.push_str(&resolved);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Ok(result)
    }
}

fn write_defines(out: &mut String, defines: &[String]) {
    for define in defines {
        out.push_str("#define ");
        out.push_str(define);
        out.push('\n');
    }
}

/// Parse a `#include "path"` directive, returning the path if found.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?;
    let rest = rest.trim();
    // Support both #include "path" and #include <path>
    if let Some(inner) = rest.strip_prefix('"') {
        inner.strip_suffix('"')
    } else if let Some(inner) = rest.strip_prefix('<') {
        inner.strip_suffix('>')
    } else {
        None
    }
}

/// Parse a `#pragma feature NAME` line, returning the feature name.
fn parse_feature_pragma(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#pragma")?.trim_start();
    let name = rest.strip_prefix("feature")?;
    if !name.starts_with(char::is_whitespace) {
        return None;
    }
    let name = name.trim();
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}
