// SYNOID Merge: Page Rendering
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use crate::state::{View, DOWNLOAD_LABEL};

const STYLE: &str = "body{font-family:sans-serif;max-width:40rem;margin:3rem auto;padding:0 1rem}\
p{margin:.4rem 0}form{margin:1rem 0}button{padding:.4rem 1rem}";

/// Render the single page for one session view.
pub fn render_page(view: &View) -> String {
    let mut body = String::new();

    if let Some(prompt) = view.prompt {
        body.push_str(&format!("<p>{}</p>\n", escape_html(prompt)));
    }
    for line in &view.lines {
        body.push_str(&format!("<p>{}</p>\n", escape_html(line)));
    }
    if view.upload_form {
        body.push_str(
            "<form method=\"post\" enctype=\"multipart/form-data\">\n\
             <input type=\"hidden\" name=\"action\" value=\"upload\">\n\
             <label>Select MP4 files <input type=\"file\" name=\"files\" accept=\".mp4\" multiple></label>\n\
             <button type=\"submit\">Upload</button>\n\
             </form>\n",
        );
    }
    if let Some(filename) = view.download {
        body.push_str(&format!(
            "<p><a href=\"/?download={name}\" download=\"{name}\">{label}</a></p>\n",
            name = escape_html(filename),
            label = DOWNLOAD_LABEL,
        ));
    }
    for action in &view.actions {
        body.push_str(&format!(
            "<form method=\"post\" enctype=\"multipart/form-data\">\
             <button type=\"submit\" name=\"action\" value=\"{}\">{}</button></form>\n",
            action.value(),
            action.label()
        ));
    }

    // Plain browser reload while a merge runs; the server never pushes.
    let refresh = view
        .refresh_secs
        .map(|secs| format!("<meta http-equiv=\"refresh\" content=\"{}\">\n", secs))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{refresh}\
         <title>Merge MP4 Files</title>\n<style>{STYLE}</style>\n</head>\n\
         <body>\n<h1>Merge MP4 Files</h1>\n{body}</body>\n</html>\n"
    )
}

fn escape_html(text: &str) -> String {
    htmlescape::encode_minimal(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Action, MERGING_NOTICE, UPLOAD_PROMPT};

    #[test]
    fn test_upload_view_has_mp4_filter() {
        let view = View {
            prompt: Some(UPLOAD_PROMPT),
            upload_form: true,
            ..View::default()
        };
        let html = render_page(&view);
        assert!(html.contains("accept=\".mp4\" multiple"));
        assert!(html.contains(UPLOAD_PROMPT));
        assert!(!html.contains("value=\"merge\""));
    }

    #[test]
    fn test_filenames_are_escaped() {
        let view = View {
            lines: vec!["Uploaded: <script>.mp4".to_string()],
            actions: vec![Action::Merge],
            ..View::default()
        };
        let html = render_page(&view);
        assert!(html.contains("Uploaded: &lt;script&gt;.mp4"));
        assert!(html.contains("value=\"merge\">Merge and Download</button>"));
        assert!(!html.contains("type=\"file\""));
    }

    #[test]
    fn test_download_link() {
        let view = View {
            download: Some("merged_output.mp4"),
            actions: vec![Action::Reset],
            ..View::default()
        };
        let html = render_page(&view);
        assert!(html.contains("href=\"/?download=merged_output.mp4\""));
        assert!(html.contains("Download merged video"));
        assert!(html.contains("value=\"reset\""));
        assert!(!html.contains("http-equiv"));
    }

    #[test]
    fn test_merging_view_reloads_itself() {
        let view = View {
            lines: vec![MERGING_NOTICE.to_string()],
            refresh_secs: Some(2),
            ..View::default()
        };
        let html = render_page(&view);
        assert!(html.contains("<meta http-equiv=\"refresh\" content=\"2\">"));
        assert!(html.contains(MERGING_NOTICE));
        assert!(!html.contains("<button"));
    }
}
