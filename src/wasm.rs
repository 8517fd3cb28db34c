//! WebAssembly bindings for the client-rendered site.

#![cfg(feature = "wasm")]

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::catalog::VideoIndex;
use crate::post::{assemble, RenderOptions, RenderState};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// Render a post and its optional bibliography.
///
/// `options` is a plain object shaped like `RenderOptions`, for example
/// `{ math_delimiters: "dollars", strict_citations: true }`. Returns the
/// rendered post as an object, or throws with the message a reader sees.
#[wasm_bindgen(js_name = renderPost)]
pub fn render_post(
    markdown: &str,
    bibliography: Option<String>,
    options: JsValue,
) -> Result<JsValue, JsError> {
    let options: RenderOptions = if options.is_undefined() || options.is_null() {
        RenderOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsError::new(&e.to_string()))?
    };

    match assemble(markdown, bibliography.as_deref(), &options) {
        RenderState::Success(post) => to_js(&post),
        state => Err(JsError::new(
            state.user_message().unwrap_or("Failed to process post content"),
        )),
    }
}

/// Normalize a video feed into `{ videos: [...] }`, newest first.
#[wasm_bindgen(js_name = parseVideos)]
pub fn parse_videos(json: &str) -> Result<JsValue, JsError> {
    let index = VideoIndex::from_json(json).map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&index)
}

#[wasm_bindgen]
pub fn slugify(title: &str) -> String {
    crate::catalog::slugify(title)
}

/// Get the library version.
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsError::new(&e.to_string()))
}

// TypeScript surface
/// ```typescript
/// export function renderPost(
///     markdown: string,
///     bibliography?: string,
///     options?: { math_delimiters?: "latex" | "dollars"; strict_citations?: boolean },
/// ): {
///     html: string;
///     metadata: { title?: string; date?: string; excerpt?: string };
///     citations: string[];
///     references: { number: number; key: string; anchor: string; html: string }[];
///     warnings: string[];
/// };
///
/// export function parseVideos(json: string): {
///     videos: { id: string; title: string; thumbnail?: string; publishedAt?: string }[];
/// };
///
/// export function slugify(title: string): string;
///
/// export function getVersion(): string;
/// ```
const _: () = ();
