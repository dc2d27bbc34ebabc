use std::borrow::Cow;
use std::path::PathBuf;

use gifwright::{
    CancelToken, CropConfig, EditConfig, GifwrightError, NullProgress, ProgressEvent,
    ProgressSink, ProgressStep, compose_images, run_edit,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gifwright_it_{}_{name}", std::process::id()))
}

const BLACK_WHITE: [u8; 6] = [0, 0, 0, 255, 255, 255];

/// Write a GIF of full-rect frames; each frame is a solid palette index.
fn write_solid_gif(path: &PathBuf, w: u16, h: u16, frames: &[(u8, u16)]) {
    let mut file = std::fs::File::create(path).unwrap();
    let mut enc = gif::Encoder::new(&mut file, w, h, &BLACK_WHITE).unwrap();
    enc.set_repeat(gif::Repeat::Infinite).unwrap();
    for &(index, delay) in frames {
        let mut frame = gif::Frame::default();
        frame.width = w;
        frame.height = h;
        frame.delay = delay;
        frame.buffer = Cow::Owned(vec![index; w as usize * h as usize]);
        enc.write_frame(&frame).unwrap();
    }
}

fn decode_output(path: &PathBuf) -> (u32, u32, Vec<(u16, Vec<u8>)>) {
    let bytes = std::fs::read(path).unwrap();
    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = opts.read_info(std::io::Cursor::new(bytes)).unwrap();
    let (w, h) = (u32::from(decoder.width()), u32::from(decoder.height()));
    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        frames.push((frame.delay, frame.buffer.to_vec()));
    }
    (w, h, frames)
}

fn run(input: &PathBuf, out: &PathBuf, cfg: &EditConfig) -> gifwright::EncodeSummary {
    run_edit(input, out, cfg, None, &mut NullProgress, &CancelToken::new()).unwrap()
}

#[test]
fn ten_frames_step_two_keeps_five_and_sums_delays() {
    let input = temp_path("step_in.gif");
    let out = temp_path("step_out.gif");
    let frames: Vec<(u8, u16)> = (0..10).map(|i| ((i % 2) as u8, 10)).collect();
    write_solid_gif(&input, 100, 100, &frames);

    let mut cfg = EditConfig::new(100);
    cfg.frame_step = 2;
    let summary = run(&input, &out, &cfg);

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.duration_cs, 100);

    let (w, h, decoded) = decode_output(&out);
    assert_eq!((w, h), (100, 100));
    assert_eq!(decoded.len(), 5);
    assert!(decoded.iter().all(|(delay, _)| *delay == 20));

    std::fs::remove_file(input).ok();
    std::fs::remove_file(out).ok();
}

#[test]
fn crop_scenario_outputs_a_100_square() {
    let input = temp_path("crop_in.gif");
    let out = temp_path("crop_out.gif");
    write_solid_gif(&input, 200, 200, &[(1, 10)]);

    let mut cfg = EditConfig::new(100);
    cfg.crop = CropConfig {
        enabled: true,
        x_pct: 25.0,
        y_pct: 25.0,
        width_pct: 50.0,
        height_pct: 50.0,
    };
    let summary = run(&input, &out, &cfg);
    assert_eq!((summary.width, summary.height), (100, 100));

    let (w, h, _) = decode_output(&out);
    assert_eq!((w, h), (100, 100));

    std::fs::remove_file(input).ok();
    std::fs::remove_file(out).ok();
}

#[test]
fn rotate_90_swaps_output_dimensions() {
    let input = temp_path("rot_in.gif");
    let out = temp_path("rot_out.gif");
    write_solid_gif(&input, 120, 80, &[(0, 10)]);

    let mut cfg = EditConfig::new(1000);
    cfg.rotate.degrees = 90;
    let summary = run(&input, &out, &cfg);
    assert_eq!((summary.width, summary.height), (80, 120));

    std::fs::remove_file(input).ok();
    std::fs::remove_file(out).ok();
}

#[test]
fn single_frame_roundtrip_bounds_quantization_error() {
    let input = temp_path("rt_in.gif");
    let out = temp_path("rt_out.gif");

    // solid mid-tone color through a private palette
    let palette = [100u8, 150, 200, 0, 0, 0];
    {
        let mut file = std::fs::File::create(&input).unwrap();
        let mut enc = gif::Encoder::new(&mut file, 32, 32, &palette).unwrap();
        let mut frame = gif::Frame::default();
        frame.width = 32;
        frame.height = 32;
        frame.delay = 10;
        frame.buffer = Cow::Owned(vec![0u8; 32 * 32]);
        enc.write_frame(&frame).unwrap();
    }

    let cfg = EditConfig::new(32);
    let summary = run(&input, &out, &cfg);
    assert_eq!((summary.width, summary.height), (32, 32));

    let (w, h, decoded) = decode_output(&out);
    assert_eq!((w, h), (32, 32));
    let pixels = &decoded[0].1;
    let n = (w * h) as f64;
    let mut err = [0.0f64; 3];
    for px in pixels.chunks_exact(4) {
        err[0] += f64::from(px[0].abs_diff(100));
        err[1] += f64::from(px[1].abs_diff(150));
        err[2] += f64::from(px[2].abs_diff(200));
    }
    // mean per-channel error stays under the widest palette level step
    for e in err {
        assert!(e / n < 85.0, "mean error {} too large", e / n);
    }

    std::fs::remove_file(input).ok();
    std::fs::remove_file(out).ok();
}

#[test]
fn partial_frames_composite_over_previous_content() {
    let input = temp_path("partial_in.gif");
    let out = temp_path("partial_out.gif");
    {
        let mut file = std::fs::File::create(&input).unwrap();
        let mut enc = gif::Encoder::new(&mut file, 4, 4, &BLACK_WHITE).unwrap();

        let mut base = gif::Frame::default();
        base.width = 4;
        base.height = 4;
        base.delay = 10;
        base.buffer = Cow::Owned(vec![0u8; 16]);
        enc.write_frame(&base).unwrap();

        // 2x2 white patch at (1,1); the rest must survive from frame 0
        let mut patch = gif::Frame::default();
        patch.left = 1;
        patch.top = 1;
        patch.width = 2;
        patch.height = 2;
        patch.delay = 10;
        patch.buffer = Cow::Owned(vec![1u8; 4]);
        enc.write_frame(&patch).unwrap();
    }

    let cfg = EditConfig::new(4);
    run(&input, &out, &cfg);

    let (w, _, decoded) = decode_output(&out);
    assert_eq!(decoded.len(), 2);
    let second = &decoded[1].1;
    let px = |x: u32, y: u32| -> [u8; 3] {
        let i = ((y * w + x) * 4) as usize;
        [second[i], second[i + 1], second[i + 2]]
    };
    assert_eq!(px(0, 0), [0, 0, 0]);
    assert_eq!(px(1, 1), [255, 255, 255]);
    assert_eq!(px(2, 2), [255, 255, 255]);
    assert_eq!(px(3, 3), [0, 0, 0]);

    std::fs::remove_file(input).ok();
    std::fs::remove_file(out).ok();
}

#[test]
fn fully_deleted_trim_fails_without_writing_output() {
    let input = temp_path("deleted_in.gif");
    let out = temp_path("deleted_out.gif");
    write_solid_gif(&input, 8, 8, &[(0, 10), (1, 10)]);

    let mut cfg = EditConfig::new(8);
    cfg.trim.deleted_frames = [0usize, 1].into_iter().collect();
    let err = run_edit(
        &input,
        &out,
        &cfg,
        None,
        &mut NullProgress,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, GifwrightError::Config(_)));
    assert!(!out.exists());

    std::fs::remove_file(input).ok();
}

#[test]
fn cancelled_run_writes_nothing() {
    let input = temp_path("cancel_in.gif");
    let out = temp_path("cancel_out.gif");
    write_solid_gif(&input, 8, 8, &[(0, 10), (1, 10)]);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = run_edit(
        &input,
        &out,
        &EditConfig::new(8),
        None,
        &mut NullProgress,
        &cancel,
    )
    .unwrap_err();
    assert!(matches!(err, GifwrightError::Cancelled));
    assert!(!out.exists());

    std::fs::remove_file(input).ok();
}

#[test]
fn non_gif_input_is_named_in_the_error() {
    let input = temp_path("sniff_in.gif");
    let out = temp_path("sniff_out.gif");
    std::fs::write(&input, [0x89, b'P', b'N', b'G', 0, 0, 0, 0]).unwrap();

    let err = run_edit(
        &input,
        &out,
        &EditConfig::new(8),
        None,
        &mut NullProgress,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("PNG"));
    assert!(!out.exists());

    std::fs::remove_file(input).ok();
}

struct Recorder(Vec<ProgressEvent>);

impl ProgressSink for Recorder {
    fn emit(&mut self, event: ProgressEvent) {
        self.0.push(event);
    }
}

#[test]
fn progress_covers_every_stage_boundary() {
    let input = temp_path("progress_in.gif");
    let out = temp_path("progress_out.gif");
    write_solid_gif(&input, 8, 8, &[(0, 10), (1, 10), (0, 10)]);

    let mut recorder = Recorder(Vec::new());
    run_edit(
        &input,
        &out,
        &EditConfig::new(8),
        None,
        &mut recorder,
        &CancelToken::new(),
    )
    .unwrap();

    let steps: Vec<ProgressStep> = recorder.0.iter().map(|e| e.step).collect();
    for expected in [
        ProgressStep::Reading,
        ProgressStep::Decoding,
        ProgressStep::Cropping,
        ProgressStep::Rotating,
        ProgressStep::Scaling,
        ProgressStep::Quantizing,
        ProgressStep::Encoding,
        ProgressStep::Writing,
    ] {
        assert!(steps.contains(&expected), "missing {expected:?}");
    }
    assert_eq!(
        recorder
            .0
            .iter()
            .filter(|e| e.step == ProgressStep::Decoding)
            .count(),
        3
    );

    std::fs::remove_file(input).ok();
    std::fs::remove_file(out).ok();
}

#[test]
fn compose_normalizes_sizes_and_applies_delay() {
    let a = temp_path("compose_a.png");
    let b = temp_path("compose_b.png");
    let out = temp_path("compose_out.gif");

    image::RgbaImage::from_pixel(40, 20, image::Rgba([255, 0, 0, 255]))
        .save(&a)
        .unwrap();
    image::RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 255, 255]))
        .save(&b)
        .unwrap();

    let summary = compose_images(
        &[a.clone(), b.clone()],
        15,
        &out,
        &EditConfig::new(40),
        None,
        &mut NullProgress,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(summary.frames, 2);
    let (w, h, decoded) = decode_output(&out);
    assert_eq!((w, h), (40, 20));
    assert!(decoded.iter().all(|(delay, _)| *delay == 15));

    // first frame is red-dominant, second is blue-dominant
    let mean = |pixels: &[u8], c: usize| -> f64 {
        pixels.chunks_exact(4).map(|p| f64::from(p[c])).sum::<f64>()
            / (pixels.len() / 4) as f64
    };
    assert!(mean(&decoded[0].1, 0) > 200.0);
    assert!(mean(&decoded[1].1, 2) > 200.0);

    std::fs::remove_file(a).ok();
    std::fs::remove_file(b).ok();
    std::fs::remove_file(out).ok();
}
