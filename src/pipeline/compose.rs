// SYNOID Merge: Compose Strategy
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Clips of different sizes and frame rates share one canvas: the largest
// width, the largest height and the highest frame rate among the inputs.
// Each clip is scaled to fit without distortion and centred with padding.

use super::ClipInfo;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Canvas {
    /// The smallest canvas that holds every clip. `None` for no clips.
    pub fn fit<'a>(infos: impl IntoIterator<Item = &'a ClipInfo>) -> Option<Canvas> {
        infos.into_iter().fold(None, |acc: Option<Canvas>, info| {
            Some(match acc {
                None => Canvas {
                    width: info.width,
                    height: info.height,
                    fps: info.fps,
                },
                Some(c) => Canvas {
                    width: c.width.max(info.width),
                    height: c.height.max(info.height),
                    fps: c.fps.max(info.fps),
                },
            })
        })
        .map(|c| Canvas {
            // libx264 with yuv420p needs even dimensions
            width: round_up_even(c.width),
            height: round_up_even(c.height),
            fps: if c.fps > 0.0 { c.fps } else { DEFAULT_FPS },
        })
    }
}

const DEFAULT_FPS: f64 = 30.0;

fn round_up_even(v: u32) -> u32 {
    let v = v.max(2);
    v + (v & 1)
}

/// Label of the composed video stream inside the filter graph.
pub const OUTPUT_LABEL: &str = "[outv]";

/// Build the `-filter_complex` graph that fits `count` inputs onto `canvas`
/// and concatenates them in input order, video only.
pub fn compose_filter(count: usize, canvas: Canvas) -> String {
    let Canvas { width: w, height: h, fps } = canvas;
    let mut graph = String::new();

    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:v:0]scale={w}:{h}:force_original_aspect_ratio=decrease:force_divisible_by=2,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps:.3},format=yuv420p[v{i}];"
        ));
    }
    for i in 0..count {
        graph.push_str(&format!("[v{i}]"));
    }
    graph.push_str(&format!("concat=n={count}:v=1:a=0{OUTPUT_LABEL}"));
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, fps: f64) -> ClipInfo {
        ClipInfo { width, height, fps }
    }

    #[test]
    fn test_canvas_takes_largest_dimensions() {
        let infos = [info(1280, 720, 30.0), info(720, 1280, 24.0), info(640, 480, 60.0)];
        let canvas = Canvas::fit(&infos).unwrap();
        assert_eq!(canvas, Canvas { width: 1280, height: 1280, fps: 60.0 });
    }

    #[test]
    fn test_canvas_rounds_odd_sizes_up() {
        let canvas = Canvas::fit(&[info(853, 479, 25.0)]).unwrap();
        assert_eq!((canvas.width, canvas.height), (854, 480));
    }

    #[test]
    fn test_canvas_empty_and_unknown_fps() {
        assert!(Canvas::fit(&[] as &[ClipInfo]).is_none());
        assert_eq!(Canvas::fit(&[info(640, 360, 0.0)]).unwrap().fps, DEFAULT_FPS);
    }

    #[test]
    fn test_compose_filter_order() {
        let canvas = Canvas { width: 640, height: 360, fps: 30.0 };
        let graph = compose_filter(3, canvas);

        assert!(graph.starts_with("[0:v:0]scale=640:360:"));
        assert!(graph.contains("pad=640:360:(ow-iw)/2:(oh-ih)/2"));
        assert!(graph.contains("fps=30.000"));
        assert!(graph.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[outv]"));
        assert_eq!(graph.matches("format=yuv420p").count(), 3);
    }
}
