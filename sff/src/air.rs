//! AIR animation scripts.
//!
//! An AIR file is a list of `[Begin Action N]` blocks. Each block holds
//! frame lines (`group, image, x, y, duration, flip, blend`) and `Clsn`
//! directives describing the two hit-box sets of the following frames.

use std::collections::BTreeMap;
use std::path::Path;

use crate::warning::Warning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HitBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    AddAlpha,
    Subtract,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationFrame {
    pub group: i32,
    pub image: i32,
    pub x: i32,
    pub y: i32,
    /// Game ticks, `-1` holds the frame forever.
    pub duration: i32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub blend_mode: BlendMode,
    pub alpha: f32,
    /// Clsn1 boxes.
    pub hit_boxes_a: Vec<HitBox>,
    /// Clsn2 boxes.
    pub hit_boxes_b: Vec<HitBox>,
    pub is_loop_marker: bool,
}

impl AnimationFrame {
    fn loop_marker(hit_boxes_a: Vec<HitBox>, hit_boxes_b: Vec<HitBox>) -> Self {
        Self {
            group: -1,
            image: -1,
            x: 0,
            y: 0,
            duration: 1,
            flip_horizontal: false,
            flip_vertical: false,
            blend_mode: BlendMode::Normal,
            alpha: 1.0,
            hit_boxes_a,
            hit_boxes_b,
            is_loop_marker: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Animation {
    pub id: i32,
    pub frames: Vec<AnimationFrame>,
    pub loop_start_index: Option<usize>,
}

impl Animation {
    fn new(id: i32) -> Self {
        Self {
            id,
            frames: Vec::new(),
            loop_start_index: None,
        }
    }

    /// Sum of frame durations, `None` if any frame holds forever.
    pub fn total_duration(&self) -> Option<i64> {
        self.frames
            .iter()
            .filter(|f| !f.is_loop_marker)
            .try_fold(0i64, |total, f| (f.duration >= 0).then(|| total + f.duration as i64))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationScript {
    pub animations: BTreeMap<i32, Animation>,
    pub warnings: Vec<Warning>,
}

impl AnimationScript {
    pub fn get(&self, id: i32) -> Option<&Animation> {
        self.animations.get(&id)
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

/// Parse a script file. Only I/O failures are errors.
pub fn parse_file(path: impl AsRef<Path>) -> std::io::Result<AnimationScript> {
    let bytes = std::fs::read(path)?;
    Ok(parse_bytes(&bytes))
}

/// Parse raw script bytes, replacing invalid UTF-8.
pub fn parse_bytes(bytes: &[u8]) -> AnimationScript {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    parse(&String::from_utf8_lossy(bytes))
}

pub fn parse(text: &str) -> AnimationScript {
    let mut parser = Parser::default();
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    for (index, line) in text.lines().enumerate() {
        parser.line(index + 1, line);
    }
    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClsnSet {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Default,
    Frame,
}

#[derive(Debug, Default)]
struct FrameList {
    capacity: usize,
    boxes: Vec<HitBox>,
}

#[derive(Debug, Default)]
struct HitBoxState {
    default_capacity: usize,
    defaults: Vec<HitBox>,
    frame: Option<FrameList>,
}

impl HitBoxState {
    fn active(&self) -> Vec<HitBox> {
        match &self.frame {
            Some(list) => list.boxes.clone(),
            None => self.defaults.clone(),
        }
    }

    fn has_room(&self, kind: ListKind) -> bool {
        match (kind, &self.frame) {
            (ListKind::Frame, Some(list)) => list.boxes.len() < list.capacity,
            (ListKind::Frame, None) => false,
            (ListKind::Default, _) => self.defaults.len() < self.default_capacity,
        }
    }
}

#[derive(Debug, Default)]
struct Parser {
    animations: BTreeMap<i32, Animation>,
    warnings: Vec<Warning>,
    current: Option<Animation>,
    a: HitBoxState,
    b: HitBoxState,
    last_opened: Option<(ClsnSet, ListKind)>,
}

impl Parser {
    fn warn(&mut self, line: usize, reason: impl Into<String>) {
        self.warnings.push(
            Warning::MalformedScriptLine {
                line,
                reason: reason.into(),
            }
            .logged(),
        );
    }

    fn set(&mut self, set: ClsnSet) -> &mut HitBoxState {
        match set {
            ClsnSet::A => &mut self.a,
            ClsnSet::B => &mut self.b,
        }
    }

    fn close_action(&mut self) {
        if let Some(animation) = self.current.take() {
            let id = animation.id;
            if self.animations.insert(id, animation).is_some() {
                log::warn!("action {} is defined more than once, keeping the last", id);
            }
        }
    }

    fn finish(mut self) -> AnimationScript {
        self.close_action();
        AnimationScript {
            animations: self.animations,
            warnings: self.warnings,
        }
    }

    fn line(&mut self, number: usize, raw: &str) {
        let line = match raw.find(';') {
            Some(at) => &raw[..at],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            return;
        }

        let lower = line.to_ascii_lowercase();
        if let Some(id) = parse_action_header(line) {
            self.close_action();
            self.current = Some(Animation::new(id));
            self.a = HitBoxState::default();
            self.b = HitBoxState::default();
            self.last_opened = None;
            return;
        }
        if lower.starts_with('[') {
            if lower.trim_start_matches(['[', ' ', '\t']).starts_with("begin") {
                self.warn(number, format!("unreadable action header `{}`", line));
            } else {
                log::debug!("line {}: skipping section `{}`", number, line);
            }
            self.close_action();
            return;
        }
        if self.current.is_none() {
            return;
        }

        if lower.starts_with("clsn") {
            self.clsn_directive(number, line, &lower);
            return;
        }
        if lower == "loopstart" || lower == "loop start" {
            self.loop_start();
            return;
        }
        if lower.starts_with("interpolate") {
            return;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if let Some(hit_box) = bare_hit_box(&fields) {
            if let Some((set, kind)) = self.last_opened {
                if self.set(set).has_room(kind) {
                    self.push_hit_box(set, kind, hit_box);
                    return;
                }
            }
        }

        self.frame(number, &fields);
    }

    fn clsn_directive(&mut self, number: usize, line: &str, lower: &str) {
        let set = match lower.as_bytes().get(4) {
            Some(b'1') => ClsnSet::A,
            Some(b'2') => ClsnSet::B,
            _ => {
                self.warn(number, format!("unknown hit-box set in `{}`", line));
                return;
            }
        };
        let rest = lower[5..].trim_start();

        if let Some(count) = rest.strip_prefix("default") {
            let Some(count) = parse_count(count) else {
                self.warn(number, "hit-box default without a count");
                return;
            };
            let state = self.set(set);
            state.default_capacity = count;
            state.defaults.clear();
            self.last_opened = Some((set, ListKind::Default));
        } else if rest.starts_with(':') {
            let Some(count) = parse_count(rest) else {
                self.warn(number, "hit-box list without a count");
                return;
            };
            self.set(set).frame = Some(FrameList {
                capacity: count,
                boxes: Vec::with_capacity(count),
            });
            self.last_opened = Some((set, ListKind::Frame));
        } else if rest.starts_with('[') {
            let coords = rest.split_once('=').map(|(_, coords)| coords);
            let Some(hit_box) = coords.and_then(parse_coords) else {
                self.warn(number, format!("unreadable hit-box `{}`", line));
                return;
            };
            if self.set(set).frame.is_some() {
                self.push_hit_box(set, ListKind::Frame, hit_box);
            } else if self.set(set).has_room(ListKind::Default) {
                self.push_hit_box(set, ListKind::Default, hit_box);
            } else {
                self.warn(number, "hit-box outside any declared list");
            }
        } else {
            self.warn(number, format!("unknown hit-box directive `{}`", line));
        }
    }

    fn push_hit_box(&mut self, set: ClsnSet, kind: ListKind, hit_box: HitBox) {
        let state = self.set(set);
        match (kind, &mut state.frame) {
            (ListKind::Frame, Some(list)) => list.boxes.push(hit_box),
            _ => state.defaults.push(hit_box),
        }
    }

    /// Per-frame lists apply to one frame only.
    fn clear_frame_lists(&mut self) {
        self.a.frame = None;
        self.b.frame = None;
        if matches!(self.last_opened, Some((_, ListKind::Frame))) {
            self.last_opened = None;
        }
    }

    fn loop_start(&mut self) {
        let marker = AnimationFrame::loop_marker(self.a.active(), self.b.active());
        self.clear_frame_lists();
        if let Some(animation) = self.current.as_mut() {
            animation.loop_start_index = Some(animation.frames.len());
            animation.frames.push(marker);
        }
    }

    fn frame(&mut self, number: usize, fields: &[&str]) {
        if fields.len() < 3 {
            self.warn(number, format!("expected a frame, found `{}`", fields.join(",")));
            return;
        }

        let int = |at: usize, default: i32| -> Option<i32> {
            match fields.get(at) {
                None | Some(&"") => Some(default),
                Some(field) => field.parse().ok(),
            }
        };
        let (Ok(group), Ok(image), Some(x), Some(y), Some(duration)) = (
            fields[0].parse::<i32>(),
            fields[1].parse::<i32>(),
            int(2, 0),
            int(3, 0),
            int(4, 1),
        ) else {
            self.warn(number, format!("unreadable frame `{}`", fields.join(",")));
            return;
        };

        let mut frame = AnimationFrame {
            group,
            image,
            x,
            y,
            duration,
            flip_horizontal: false,
            flip_vertical: false,
            blend_mode: BlendMode::Normal,
            alpha: 1.0,
            hit_boxes_a: self.a.active(),
            hit_boxes_b: self.b.active(),
            is_loop_marker: false,
        };
        for token in fields.iter().skip(5) {
            apply_token(&mut frame, token);
        }

        self.clear_frame_lists();
        if let Some(animation) = self.current.as_mut() {
            animation.frames.push(frame);
        }
    }
}

/// `[Begin Action N]`, brackets optional, any case.
fn parse_action_header(line: &str) -> Option<i32> {
    let inner = line.strip_prefix('[').unwrap_or(line);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    let mut words = inner.split_whitespace();

    if !words.next()?.eq_ignore_ascii_case("begin") || !words.next()?.eq_ignore_ascii_case("action") {
        return None;
    }
    let id = words.next()?.parse().ok()?;
    words.next().is_none().then_some(id)
}

/// `: n` with optional whitespace.
fn parse_count(rest: &str) -> Option<usize> {
    rest.trim_start().strip_prefix(':')?.trim().parse().ok()
}

fn parse_coords(coords: &str) -> Option<HitBox> {
    let values: Vec<i32> = coords
        .split(',')
        .map(|v| v.trim().parse())
        .collect::<Result<_, _>>()
        .ok()?;
    match values[..] {
        [x1, y1, x2, y2] => Some(HitBox { x1, y1, x2, y2 }),
        _ => None,
    }
}

/// A line of exactly four integers.
fn bare_hit_box(fields: &[&str]) -> Option<HitBox> {
    if fields.len() != 4 {
        return None;
    }
    parse_coords(&fields.join(","))
}

fn apply_token(frame: &mut AnimationFrame, token: &str) {
    let token = token.to_ascii_uppercase();

    for c in token.chars() {
        match c {
            'H' => frame.flip_horizontal = true,
            'V' => frame.flip_vertical = true,
            _ => {}
        }
    }

    if let Some(at) = token.find("AS") {
        let source = token[at + 2..]
            .split('D')
            .next()
            .and_then(|s| s.parse::<u16>().ok());
        frame.blend_mode = BlendMode::AddAlpha;
        frame.alpha = source.map_or(1.0, |s| (s.min(256) as f32) / 256.0);
    } else if token.contains("A1") {
        frame.blend_mode = BlendMode::Add;
        frame.alpha = 0.5;
    } else if token.contains('A') {
        frame.blend_mode = BlendMode::Add;
        frame.alpha = 1.0;
    } else if token.contains('S') {
        frame.blend_mode = BlendMode::Subtract;
    }
}
