use crate::extractor::CodeState;

/// Assemble the full document the preview iframe loads: stylesheet in the
/// head, markup in the body, script at the end wrapped in try/catch so a
/// broken generation logs instead of killing the pane.
pub fn compose_document(code: &CodeState) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <style>
{stylesheet}
  </style>
</head>
<body>
{markup}
<script>
try {{
{script}
}} catch (error) {{
  console.error('Error in preview:', error);
}}
</script>
</body>
</html>"#,
        stylesheet = code.stylesheet,
        markup = code.markup,
        script = code.script,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_document_embeds_all_fragments() {
        let code = CodeState {
            markup: "<h1>Hi</h1>".to_string(),
            stylesheet: "h1 { color: red; }".to_string(),
            script: "console.log('hi');".to_string(),
        };
        let doc = compose_document(&code);
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<h1>Hi</h1>"));
        assert!(doc.contains("h1 { color: red; }"));
        assert!(doc.contains("console.log('hi');"));
        assert!(doc.contains("try {"));
        assert!(doc.contains("console.error('Error in preview:', error);"));
    }

    #[test]
    fn test_compose_document_of_empty_state_is_valid_shell() {
        let doc = compose_document(&CodeState::default());
        assert!(doc.contains("<body>"));
        assert!(doc.contains("</html>"));
    }
}
