//! The IR document: the read-only input of a compile.
//!
//! Owns global inputs, external resources, struct definitions, and
//! functions. The canonical resource order defined here is the binding-index
//! contract shared with the runtime harness: emitted code indexes
//! `ctx.resources` by position in this order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attr::AttrValue;
use crate::function::Function;
use crate::types::{StructDef, ValueType};

/// A global input: a scalar/vector parameter or a bound texture.
///
/// Texture-typed inputs participate in the canonical resource order; all
/// others are read through the harness by name (aggregates via the flattened
/// `name_0..name_{n-1}` convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalInput {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: Option<AttrValue>,
    #[serde(default)]
    pub ui: Option<AttrValue>,
}

impl GlobalInput {
    /// `true` if this input binds a texture rather than a parameter value.
    pub fn is_texture(&self) -> bool {
        self.ty == "texture2d"
    }
}

/// Kind of an external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Texture2d,
    Buffer,
    AtomicCounter,
}

/// Texture sampling state. Both attributes are optional in the IR; absent
/// values mean `repeat` wrapping and `linear` filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sampler {
    #[serde(default)]
    pub wrap: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

/// Resource persistence hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persistence {
    #[serde(default, rename = "clearOnResize")]
    pub clear_on_resize: bool,
    #[serde(flatten)]
    pub extra: IndexMap<String, AttrValue>,
}

/// An external resource the emitted program binds at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default, rename = "dataType")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub sampler: Option<Sampler>,
    #[serde(default, rename = "isOutput")]
    pub is_output: bool,
    #[serde(default)]
    pub persistence: Option<Persistence>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

impl Resource {
    /// `true` for texture resources.
    pub fn is_texture(&self) -> bool {
        self.kind == ResourceKind::Texture2d
    }

    /// Element stride in floats, derived from `dataType` (default `float`).
    pub fn stride(&self) -> usize {
        self.data_type
            .as_deref()
            .and_then(ValueType::parse)
            .and_then(|t| t.float_components())
            .unwrap_or(1)
    }
}

/// Wrap mode numeric code: `repeat:0, clamp:1, mirror:2`. Unknown strings
/// fall back to `repeat`.
pub fn wrap_code(mode: Option<&str>) -> u32 {
    match mode {
        Some("clamp") => 1,
        Some("mirror") => 2,
        _ => 0,
    }
}

/// Filter mode numeric code: `nearest:0, linear:1`. Unknown strings fall
/// back to `linear`.
pub fn filter_code(mode: Option<&str>) -> u32 {
    match mode {
        Some("nearest") => 0,
        _ => 1,
    }
}

/// Texture format numeric code.
pub fn format_code(format: Option<&str>) -> u32 {
    match format {
        Some("rgba8") => 1,
        Some("rgba16f") => 2,
        Some("rgba32f") => 3,
        Some("r8") => 4,
        Some("r16f") => 5,
        Some("r32f") => 6,
        _ => 0,
    }
}

/// `true` for single-channel formats (sampling stride 1 instead of 4).
pub fn is_single_channel(format: Option<&str>) -> bool {
    matches!(format, Some("r8") | Some("r16f") | Some("r32f"))
}

/// An IR document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrDocument {
    #[serde(default)]
    pub meta: IndexMap<String, AttrValue>,
    #[serde(default)]
    pub entry_point_id: Option<String>,
    #[serde(default)]
    pub inputs: Vec<GlobalInput>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl IrDocument {
    /// Function lookup by id.
    pub fn function(&self, id: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    /// Struct lookup by id.
    pub fn struct_def(&self, id: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.id == id)
    }

    /// Global input lookup by id.
    pub fn global_input(&self, id: &str) -> Option<&GlobalInput> {
        self.inputs.iter().find(|i| i.id == id)
    }

    /// Resource lookup by id.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// The canonical resource order: output-flagged resources, then
    /// texture-typed inputs, then the remaining resources, each in IR order.
    /// Position in this list is the binding index emitted code uses.
    pub fn resource_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        for r in self.resources.iter().filter(|r| r.is_output) {
            order.push(r.id.as_str());
        }
        for i in self.inputs.iter().filter(|i| i.is_texture()) {
            order.push(i.id.as_str());
        }
        for r in self.resources.iter().filter(|r| !r.is_output) {
            order.push(r.id.as_str());
        }
        order
    }

    /// Binding index of a resource or texture input in the canonical order.
    pub fn binding_index(&self, id: &str) -> Option<usize> {
        self.resource_order().iter().position(|r| *r == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> IrDocument {
        serde_json::from_value(serde_json::json!({
            "meta": {"name": "demo"},
            "entry_point_id": "main",
            "inputs": [
                {"id": "u_speed", "type": "float", "default": 1.0},
                {"id": "u_tex", "type": "texture2d"},
                {"id": "u_dir", "type": "float3"}
            ],
            "resources": [
                {"id": "trail", "type": "buffer", "dataType": "float2"},
                {"id": "out_tex", "type": "texture2d", "format": "rgba16f", "isOutput": true},
                {"id": "counts", "type": "buffer"}
            ],
            "structs": [
                {"id": "Particle", "members": [
                    {"name": "pos", "type": "float3"},
                    {"name": "age", "type": "float"}
                ]}
            ],
            "functions": [{"id": "main"}]
        }))
        .unwrap()
    }

    #[test]
    fn canonical_resource_order() {
        let d = doc();
        assert_eq!(d.resource_order(), vec!["out_tex", "u_tex", "trail", "counts"]);
        assert_eq!(d.binding_index("out_tex"), Some(0));
        assert_eq!(d.binding_index("u_tex"), Some(1));
        assert_eq!(d.binding_index("counts"), Some(3));
        assert_eq!(d.binding_index("nope"), None);
    }

    #[test]
    fn lookups() {
        let d = doc();
        assert!(d.function("main").is_some());
        assert!(d.struct_def("Particle").is_some());
        assert_eq!(d.struct_def("Particle").unwrap().members.len(), 2);
        assert!(d.global_input("u_speed").is_some());
        assert!(d.resource("trail").is_some());
    }

    #[test]
    fn resource_stride_follows_data_type() {
        let d = doc();
        assert_eq!(d.resource("trail").unwrap().stride(), 2);
        assert_eq!(d.resource("counts").unwrap().stride(), 1);
    }

    #[test]
    fn sampler_codes() {
        assert_eq!(wrap_code(Some("repeat")), 0);
        assert_eq!(wrap_code(Some("clamp")), 1);
        assert_eq!(wrap_code(Some("mirror")), 2);
        assert_eq!(wrap_code(None), 0);
        assert_eq!(filter_code(Some("nearest")), 0);
        assert_eq!(filter_code(Some("linear")), 1);
        assert_eq!(filter_code(None), 1);
    }

    #[test]
    fn format_codes() {
        assert_eq!(format_code(Some("rgba8")), 1);
        assert_eq!(format_code(Some("rgba16f")), 2);
        assert_eq!(format_code(Some("rgba32f")), 3);
        assert_eq!(format_code(Some("r8")), 4);
        assert_eq!(format_code(Some("r16f")), 5);
        assert_eq!(format_code(Some("r32f")), 6);
        assert_eq!(format_code(None), 0);
        assert_eq!(format_code(Some("wat")), 0);
        assert!(is_single_channel(Some("r32f")));
        assert!(!is_single_channel(Some("rgba8")));
    }

    #[test]
    fn serde_roundtrip() {
        let d = doc();
        let json = serde_json::to_string(&d).unwrap();
        let back: IrDocument = serde_json::from_str(&json).unwrap();
        let json2 = serde_json::to_string(&back).unwrap();
        assert_eq!(json, json2);
    }
}
