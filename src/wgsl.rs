//! WGSL validation using the naga library.
//!
//! Effect shaders are plain WGSL files. A technique is the name of a
//! fragment entry point; every effect file also provides the full-screen
//! quad vertex entry point [`QUAD_VERTEX_ENTRY`].

/// Vertex entry point shared by every technique in an effect file.
pub const QUAD_VERTEX_ENTRY: &str = "vs_main";

/// Entry points of a validated module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPoints {
    pub vertex: Vec<String>,
    pub fragment: Vec<String>,
}

impl EntryPoints {
    pub fn has_fragment(&self, name: &str) -> bool {
        self.fragment.iter().any(|f| f == name)
    }

    pub fn has_vertex(&self, name: &str) -> bool {
        self.vertex.iter().any(|v| v == name)
    }
}

/// Parses and validates `source`, returning its entry points.
///
/// The error string is naga's diagnostic, rendered against the source.
pub fn validate(source: &str) -> Result<EntryPoints, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.emit_to_string(source))?;

    let mut entry_points = EntryPoints::default();
    for ep in &module.entry_points {
        match ep.stage {
            naga::ShaderStage::Vertex => entry_points.vertex.push(ep.name.clone()),
            naga::ShaderStage::Fragment => entry_points.fragment.push(ep.name.clone()),
            _ => {}
        }
    }
    Ok(entry_points)
}

/// Validates `source` and checks it can run `technique` as a full-screen quad.
pub fn validate_technique(source: &str, technique: &str) -> Result<EntryPoints, String> {
    let entry_points = validate(source)?;
    if !entry_points.has_vertex(QUAD_VERTEX_ENTRY) {
        return Err(format!("missing vertex entry point '{QUAD_VERTEX_ENTRY}'"));
    }
    if !entry_points.has_fragment(technique) {
        return Err(format!("missing technique '{technique}'"));
    }
    Ok(entry_points)
}
