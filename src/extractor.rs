use serde::{Deserialize, Serialize};

/// The three editable fragments of the generated page. Replaced wholesale on
/// every successful extraction; fields the response did not mention keep the
/// previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeState {
    pub markup: String,
    pub stylesheet: String,
    pub script: String,
}

impl CodeState {
    pub fn is_empty(&self) -> bool {
        self.markup.is_empty() && self.stylesheet.is_empty() && self.script.is_empty()
    }
}

/// One markdown fence: the label after the opening backticks and the raw
/// body up to the closing backticks.
#[derive(Debug, PartialEq)]
struct FencedSegment<'a> {
    label: &'a str,
    body: &'a str,
}

fn recognized_label(label: &str) -> bool {
    matches!(label, "html" | "css" | "javascript" | "typescript")
}

/// Tokenize `text` into recognized fenced segments in document order. A
/// segment opens at "```<label>\n" (label case-sensitive) and closes at the
/// next "```"; an unclosed fence yields nothing. Backticks opening an
/// unrecognized fence are stepped over one delimiter at a time, and a closing
/// delimiter may open the next fence, so a recognized fence is found wherever
/// an independent per-label scan would have found it.
fn fenced_segments(text: &str) -> Vec<FencedSegment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(nl) = after.find('\n') else { break };
        let label = after[..nl].trim_end_matches('\r');
        if !recognized_label(label) {
            rest = after;
            continue;
        }
        let body_start = nl + 1;
        let Some(close) = after[body_start..].find("```") else {
            break;
        };
        segments.push(FencedSegment {
            label,
            body: &after[body_start..body_start + close],
        });
        rest = &after[body_start + close..];
    }
    segments
}

/// Convert one raw LLM completion plus the previous `CodeState` into a new
/// `CodeState`. Pure and total: malformed input never fails, it just leaves
/// the previous values in place.
///
/// Per field, the first fence labeled `html`, `css`, or
/// `javascript`/`typescript` wins; a field with no matching fence keeps
/// `previous`'s value. Only when none of the recognized labels appear
/// anywhere does the whole-document sniffing fallback run.
pub fn extract(raw_text: &str, previous: &CodeState) -> CodeState {
    let mut markup = None;
    let mut stylesheet = None;
    let mut script = None;

    for segment in fenced_segments(raw_text) {
        match segment.label {
            "html" if markup.is_none() => markup = Some(segment.body.trim()),
            "css" if stylesheet.is_none() => stylesheet = Some(segment.body.trim()),
            "javascript" | "typescript" if script.is_none() => {
                script = Some(segment.body.trim())
            }
            _ => {}
        }
    }

    if markup.is_none() && stylesheet.is_none() && script.is_none() {
        return classify_unfenced(raw_text, previous);
    }

    CodeState {
        markup: markup.map_or_else(|| previous.markup.clone(), str::to_string),
        stylesheet: stylesheet.map_or_else(|| previous.stylesheet.clone(), str::to_string),
        script: script.map_or_else(|| previous.script.clone(), str::to_string),
    }
}

/// Best-effort content sniffing for responses that skipped the fence
/// convention entirely. The decision order is load-bearing for compatibility
/// and is a heuristic, not a guarantee: `<` means markup; braces plus
/// `@media` or `:` mean stylesheet; bare braces mean script; anything else
/// touches nothing.
fn classify_unfenced(raw_text: &str, previous: &CodeState) -> CodeState {
    let text = raw_text.trim();
    let mut state = previous.clone();
    if text.contains('<') {
        state.markup = text.to_string();
    } else if text.contains('{') && text.contains('}') {
        if text.contains("@media") || text.contains(':') {
            state.stylesheet = text.to_string();
        } else {
            state.script = text.to_string();
        }
    }
    state
}
