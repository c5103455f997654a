use swc_common::{
    source_map::DefaultSourceMapGenConfig, sync::Lrc, BytePos, FileName, LineCol, SourceMap,
};

use crate::edit::Mapping;
use crate::error::TransformError;

/// Serialize splice mappings as a version 3 source map against the
/// original document.
pub fn to_json(filename: &str, source: &str, mappings: &[Mapping]) -> Result<String, TransformError> {
    let cm: Lrc<SourceMap> = Default::default();
    let file = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let entries: Vec<(BytePos, LineCol)> = mappings
        .iter()
        .map(|m| {
            (
                file.start_pos + BytePos(m.original as u32),
                LineCol {
                    line: m.generated_line,
                    col: m.generated_col,
                },
            )
        })
        .collect();

    let map = cm.build_source_map(&entries, None, DefaultSourceMapGenConfig);
    let mut json = vec![];
    map.to_writer(&mut json)
        .map_err(|e| TransformError::SourceMap(e.to_string()))?;
    String::from_utf8(json).map_err(|e| TransformError::SourceMap(e.to_string()))
}
