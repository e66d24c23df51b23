//! Points, selections and caret movement.
//!
//! A `Point` always addresses a text node with a character offset. Movement
//! works on the "block text" of the caret's block: the concatenation of its
//! text leaves, minus any leaves the caller asks to skip (text that is
//! already proposed for deletion, in suggesting mode).

use crate::node::NodeKey;
use crate::tree::Document;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

impl Point {
    pub fn new(key: NodeKey, offset: usize) -> Self {
        Self { key, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Backward,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Character,
    Word,
    /// To the edge of the block
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    key: NodeKey,
    start: usize,
    end: usize,
}

/// Flattened text of one block
#[derive(Debug, Clone)]
pub struct BlockText {
    segments: Vec<Segment>,
    chars: Vec<char>,
}

impl BlockText {
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Point covering the character at `offset` (start of a range)
    fn point_before(&self, offset: usize) -> Option<Point> {
        self.segments
            .iter()
            .find(|s| s.start <= offset && offset < s.end)
            .or_else(|| self.segments.iter().rev().find(|s| s.end == offset))
            .map(|s| Point::new(s.key, offset - s.start))
    }

    /// Point just after the character at `offset - 1` (end of a range)
    fn point_after(&self, offset: usize) -> Option<Point> {
        self.segments
            .iter()
            .find(|s| s.start < offset && offset <= s.end)
            .or_else(|| self.segments.iter().find(|s| s.start == offset))
            .map(|s| Point::new(s.key, offset - s.start))
    }
}

impl Document {
    /// Whether `point` addresses an attached text node within bounds
    pub fn is_valid_point(&self, point: Point) -> bool {
        self.is_text(point.key) && point.offset <= self.text_len(point.key)
    }

    pub fn compare_points(&self, a: Point, b: Point) -> Ordering {
        self.path(a.key)
            .cmp(&self.path(b.key))
            .then(a.offset.cmp(&b.offset))
    }

    /// `(start, end)` of a selection in document order
    pub fn ordered(&self, selection: &Selection) -> (Point, Point) {
        match self.compare_points(selection.anchor, selection.focus) {
            Ordering::Greater => (selection.focus, selection.anchor),
            _ => (selection.anchor, selection.focus),
        }
    }

    pub fn start_of(&self, key: NodeKey) -> Option<Point> {
        self.text_leaves(key)
            .first()
            .map(|leaf| Point::new(*leaf, 0))
    }

    pub fn end_of(&self, key: NodeKey) -> Option<Point> {
        self.text_leaves(key)
            .last()
            .map(|leaf| Point::new(*leaf, self.text_len(*leaf)))
    }

    /// Text of `block` with leaves matching `skip` left out
    pub fn block_text(&self, block: NodeKey, skip: &dyn Fn(&Document, NodeKey) -> bool) -> BlockText {
        let mut segments = Vec::new();
        let mut chars = Vec::new();
        for leaf in self.text_leaves(block) {
            if skip(self, leaf) {
                continue;
            }
            let start = chars.len();
            chars.extend(self.text(leaf).unwrap_or_default().chars());
            segments.push(Segment {
                key: leaf,
                start,
                end: chars.len(),
            });
        }
        BlockText { segments, chars }
    }

    /// Point at a character offset into the full text of `block`
    pub fn text_point(&self, block: NodeKey, offset: usize) -> Option<Point> {
        self.block_text(block, &|_, _| false).point_before(offset)
    }

    /// Offset of `point` within the block text, counting only kept leaves
    fn caret_offset(&self, block: NodeKey, text: &BlockText, point: Point) -> usize {
        if let Some(segment) = text.segments.iter().find(|s| s.key == point.key) {
            return segment.start + point.offset.min(segment.end - segment.start);
        }
        let mut offset = 0;
        for leaf in self.text_leaves(block) {
            if leaf == point.key {
                break;
            }
            if let Some(segment) = text.segments.iter().find(|s| s.key == leaf) {
                offset = segment.end;
            }
        }
        offset
    }

    /// `(block, offset, length)` of a point within the full text of its block
    pub fn block_offset(&self, point: Point) -> Option<(NodeKey, usize, usize)> {
        let block = self.nearest_block(point.key)?;
        let text = self.block_text(block, &|_, _| false);
        let offset = self.caret_offset(block, &text, point);
        Some((block, offset, text.len()))
    }

    /// Extend a collapsed caret by one unit.
    ///
    /// The anchor stays at the caret and the focus moves to the target.
    /// Movement never leaves the caret's block; `None` means the caret sits
    /// on the boundary (or nothing but skipped text lies in that direction).
    pub fn extend(
        &self,
        caret: Point,
        direction: Direction,
        granularity: Granularity,
        skip: &dyn Fn(&Document, NodeKey) -> bool,
    ) -> Option<Selection> {
        let block = self.nearest_block(caret.key)?;
        let text = self.block_text(block, skip);
        let from = self.caret_offset(block, &text, caret);
        let chars = &text.chars;

        let target = match (direction, granularity) {
            (Direction::Backward, Granularity::Character) => from.checked_sub(1)?,
            (Direction::Forward, Granularity::Character) => {
                if from >= chars.len() {
                    return None;
                }
                from + 1
            }
            (Direction::Backward, Granularity::Word) => {
                let mut t = from;
                while t > 0 && chars[t - 1].is_whitespace() {
                    t -= 1;
                }
                while t > 0 && !chars[t - 1].is_whitespace() {
                    t -= 1;
                }
                t
            }
            (Direction::Forward, Granularity::Word) => {
                let mut t = from;
                while t < chars.len() && chars[t].is_whitespace() {
                    t += 1;
                }
                while t < chars.len() && !chars[t].is_whitespace() {
                    t += 1;
                }
                t
            }
            (Direction::Backward, Granularity::Line) => 0,
            (Direction::Forward, Granularity::Line) => chars.len(),
        };
        if target == from {
            return None;
        }

        let focus = match direction {
            Direction::Backward => text.point_before(target)?,
            Direction::Forward => text.point_after(target)?,
        };
        Some(Selection::new(caret, focus))
    }

    /// Where a point should go once the subtree at `removed` disappears:
    /// the end of the previous text leaf outside it, otherwise the start of
    /// the next one.
    pub fn relocate_point(&self, point: Point, removed: NodeKey) -> Option<Point> {
        if !self.is_ancestor_or_self(removed, point.key) {
            return Some(point);
        }
        if let Some(previous) = self.previous_text_leaf(removed) {
            return Some(Point::new(previous, self.text_len(previous)));
        }
        self.next_text_leaf(removed).map(|next| Point::new(next, 0))
    }
}
