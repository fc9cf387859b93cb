//! HTML/SVG rendering of the Chrumm keymap, one ortho grid per layer.

use chrumm_core::config::{COLS, ROWS};
use chrumm_core::keymap::{index, Keymap, LAYERS, NUM_LAYERS};
use chrumm_core::usage::{self, Usage};

/// Key unit size in SVG pixels.
const U: f64 = 54.0;
/// Gap between keys.
const GAP: f64 = 4.0;
/// Step: key + gap.
const S: f64 = U + GAP;
const R: f64 = 4.0;
const MARGIN: f64 = 20.0;
/// Room above each grid for the layer title.
const TITLE: f64 = 30.0;

const LAYER_NAMES: [&str; NUM_LAYERS] = ["Base", "Fn"];

fn key_class(usage: Usage) -> &'static str {
    match usage {
        Usage::None => "key unused",
        Usage::Boot => "key boot",
        _ if usage == usage::FN => "key layer",
        Usage::Consumer(_) => "key media",
        _ if usage.is_modifier() => "key modifier",
        _ => "key",
    }
}

fn label(usage: Usage) -> String {
    match (usage, usage.label()) {
        (Usage::Keyboard(id), "") => format!("0x{:02X}", id),
        (Usage::Consumer(id), "") => format!("0x{:03X}", id),
        (_, label) => label.to_string(),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_layer(keymap: &Keymap, layer: usize, y_offset: f64) -> String {
    let mut svg = format!(
        r#"<g transform="translate({MARGIN}, {y_offset})"><text x="0" y="-10" class="layer-title">Layer {layer} ({})</text>"#,
        LAYER_NAMES[layer]
    );

    for row in 0..ROWS {
        for col in 0..COLS {
            let usage = keymap[layer][index(row, col)];
            let (x, y) = (col as f64 * S, row as f64 * S);

            svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{U}" height="{U}" rx="{R}" class="{}"/>"#,
                key_class(usage)
            ));

            let text = label(usage);
            if !text.is_empty() {
                let font_class = if text.len() > 3 { " small" } else { "" };
                svg.push_str(&format!(
                    r#"<text x="{}" y="{}" class="label{font_class}">{}</text>"#,
                    x + U / 2.0,
                    y + U / 2.0 + 1.0,
                    html_escape(&text),
                ));
            }
        }
    }

    svg.push_str("</g>");
    svg
}

/// Render `keymap` as a standalone HTML page.
pub fn render(keymap: &Keymap) -> String {
    let grid_w = COLS as f64 * S - GAP;
    let grid_h = ROWS as f64 * S - GAP;
    let layer_height = grid_h + TITLE + 30.0;
    let total_width = grid_w + 2.0 * MARGIN;
    let total_height = NUM_LAYERS as f64 * layer_height + 2.0 * MARGIN;

    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Chrumm Layout</title>
<style>
  body {{
    background: #1a1a2e;
    color: #eee;
    font-family: system-ui, sans-serif;
    display: flex;
    justify-content: center;
    padding: 2em;
  }}
  .key {{ fill: #16213e; stroke: #0f3460; stroke-width: 1.5; }}
  .key:hover {{ fill: #1a1a5e; stroke: #e94560; }}
  .key.unused {{ fill: #0d1117; stroke: #21262d; stroke-dasharray: 3 3; }}
  .key.layer {{ fill: #2d1b4e; stroke: #e94560; stroke-width: 2; }}
  .key.boot {{ fill: #4e1b1b; stroke: #ff6b6b; stroke-width: 2; }}
  .key.modifier {{ fill: #1b2e4e; stroke: #53a8b6; }}
  .key.media {{ fill: #1b4e2e; stroke: #6bcf7f; }}
  .label {{
    fill: #eee;
    font-family: "JetBrains Mono", monospace;
    font-size: 13px;
    text-anchor: middle;
    dominant-baseline: middle;
    pointer-events: none;
  }}
  .label.small {{ font-size: 10px; }}
  .layer-title {{ fill: #e94560; font-size: 16px; font-weight: bold; }}
</style>
</head>
<body>
<svg width="{total_width}" height="{total_height}" xmlns="http://www.w3.org/2000/svg">
"#
    );

    for layer in 0..NUM_LAYERS {
        let y_offset = MARGIN + layer as f64 * layer_height + TITLE;
        html.push_str(&render_layer(keymap, layer, y_offset));
        html.push('\n');
    }

    html.push_str("</svg>\n</body>\n</html>\n");
    html
}

/// Render the built-in keymap.
pub fn generate_html() -> String {
    render(&LAYERS)
}
