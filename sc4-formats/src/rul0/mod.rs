//! RUL0 network-junction rule decoder.
//!
//! The payload is an INI-flavored script: an ordering preamble of rotation
//! rings, then one `[HighwayIntersectionInfo_0xID]` section per puzzle
//! piece. After parsing, a transformation pipeline resolves each piece's
//! declarative `CopyFrom` / `Rotate` / `Transpose` / `Translate` into its
//! grids, preview effect and network flag words.

pub mod ini;
mod transform;

use std::collections::BTreeMap;

use tracing::debug;

use crate::Result;

pub use transform::{rotate_edge_flags, transpose_edge_flags};

/// Glyph used to pad ragged layout rows and to fill grown grid areas.
pub const EMPTY_CELL: char = '.';

const ORDERING_SECTION: &str = "Ordering";
const INTERSECTION_PREFIX: &str = "HighwayIntersectionInfo_";

/// Rows of single-character glyphs. Rows may be ragged; grid operations
/// normalize to a rectangle first.
pub type Grid = Vec<String>;

/// Network kinds a cell-grid glyph can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    Road,
    Rail,
    Highway,
    Street,
    Pipe,
    Powerline,
    Avenue,
    Subway,
    LightRail,
    Monorail,
    OneWayRoad,
    DirtRoad,
    GroundHighway,
    #[default]
    None,
}

impl NetworkType {
    /// Case-insensitive name lookup; unknown names map to [`NetworkType::None`].
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "road" => Self::Road,
            "rail" => Self::Rail,
            "highway" => Self::Highway,
            "street" => Self::Street,
            "pipe" => Self::Pipe,
            "powerline" => Self::Powerline,
            "avenue" => Self::Avenue,
            "subway" => Self::Subway,
            "lightrail" => Self::LightRail,
            "monorail" => Self::Monorail,
            "onewayroad" => Self::OneWayRoad,
            "dirtroad" => Self::DirtRoad,
            "groundhighway" => Self::GroundHighway,
            _ => Self::None,
        }
    }
}

/// One network test bound to a cell glyph. The flag words are four 8-bit
/// edge slots packed `[S, E, N, W]` from high byte to low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkCheck {
    pub network: NetworkType,
    pub rule_flags: u32,
    pub hex_mask: u32,
    pub optional: bool,
    pub check: bool,
}

impl Default for NetworkCheck {
    fn default() -> Self {
        Self {
            network: NetworkType::None,
            rule_flags: 0xFFFF_FFFF,
            hex_mask: 0xFFFF_FFFF,
            optional: false,
            check: false,
        }
    }
}

/// Binding of a cell-grid glyph to its network checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckType {
    pub symbol: char,
    pub networks: Vec<NetworkCheck>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewEffect {
    pub initialized: bool,
    pub x: f32,
    pub y: f32,
    pub rotation: i32,
    pub flip: i32,
    pub instance_id: u32,
    pub name: String,
}

impl Default for PreviewEffect {
    fn default() -> Self {
        Self {
            initialized: false,
            x: 0.0,
            y: 0.0,
            rotation: 0,
            flip: 0,
            instance_id: 0xFFFF_FFFF,
            name: String::new(),
        }
    }
}

/// Quarter-turn rotation amount, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    Rot0,
    Rot90,
    Rot180,
    Rot270,
    #[default]
    None,
}

impl Rotation {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Rot0),
            1 => Some(Self::Rot90),
            2 => Some(Self::Rot180),
            3 => Some(Self::Rot270),
            _ => None,
        }
    }

    /// Number of quarter turns this rotation applies.
    pub fn quarter_turns(self) -> u32 {
        match self {
            Self::Rot90 => 1,
            Self::Rot180 => 2,
            Self::Rot270 => 3,
            Self::Rot0 | Self::None => 0,
        }
    }
}

/// Eight compass directions plus the "none" sentinel (8). Values at or above
/// the sentinel pass through rotation and transpose unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OneWayDir {
    West,
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    #[default]
    None,
}

impl OneWayDir {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::West),
            1 => Some(Self::NorthWest),
            2 => Some(Self::North),
            3 => Some(Self::NorthEast),
            4 => Some(Self::East),
            5 => Some(Self::SouthEast),
            6 => Some(Self::South),
            7 => Some(Self::SouthWest),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::West => 0,
            Self::NorthWest => 1,
            Self::North => 2,
            Self::NorthEast => 3,
            Self::East => 4,
            Self::SouthEast => 5,
            Self::South => 6,
            Self::SouthWest => 7,
            Self::None => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplacementIntersection {
    pub initialized: bool,
    pub rotation: Rotation,
    pub flip: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Translation {
    pub initialized: bool,
    pub x: u32,
    pub z: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleOffset {
    pub initialized: bool,
    pub delta_straight: i32,
    pub delta_side: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOffsets {
    pub initialized: bool,
    pub drag_start_threshold: u32,
    pub drag_completion_offset: u32,
}

/// Snapshot of a piece's declarative transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub copy_from: u32,
    pub rotate: Rotation,
    pub transpose: bool,
    pub translate: Translation,
}

/// One junction layout keyed by its 32-bit id.
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzlePiece {
    pub id: u32,
    pub effect: PreviewEffect,
    pub cell_layout: Grid,
    pub cons_layout: Grid,
    pub check_types: Vec<CheckType>,

    pub auto_path_base: u32,
    pub auto_tile_base: u32,
    pub replacement_intersection: ReplacementIntersection,
    pub place_query_id: u32,
    pub convert_query_id: u32,
    pub costs: u32,
    pub auto_place: bool,
    pub handle_offset: HandleOffset,
    pub step_offsets: StepOffsets,
    pub one_way_dir: OneWayDir,

    /// Declarative transform, cleared as the pipeline applies each step.
    pub copy_from: u32,
    pub rotate: Rotation,
    pub transpose: bool,
    pub translate: Translation,

    /// What the script asked for, snapshotted before copy-from runs.
    pub requested_transform: Transform,
    /// What the pipeline executed for this piece.
    pub applied_transform: Transform,
}

impl Default for PuzzlePiece {
    fn default() -> Self {
        Self {
            id: 0,
            effect: PreviewEffect::default(),
            cell_layout: Vec::new(),
            cons_layout: Vec::new(),
            check_types: Vec::new(),
            auto_path_base: 0xFFFF_FFFF,
            auto_tile_base: 0xFFFF_FFFF,
            replacement_intersection: ReplacementIntersection::default(),
            place_query_id: 0xFFFF_FFFF,
            convert_query_id: 0xFFFF_FFFF,
            costs: 0xFFFF_FFFF,
            auto_place: false,
            handle_offset: HandleOffset::default(),
            step_offsets: StepOffsets::default(),
            one_way_dir: OneWayDir::None,
            copy_from: 0,
            rotate: Rotation::None,
            transpose: false,
            translate: Translation::default(),
            requested_transform: Transform::default(),
            applied_transform: Transform::default(),
        }
    }
}

/// Result of sampling both grids at one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSample<'a> {
    pub row: usize,
    pub col: usize,
    pub cell: Option<char>,
    pub cons: Option<char>,
    pub check_type: Option<&'a CheckType>,
}

impl PuzzlePiece {
    /// Cell grid padded to a rectangle with [`EMPTY_CELL`].
    pub fn normalized_cell_layout(&self) -> Grid {
        transform::normalize_grid(&self.cell_layout)
    }

    /// Construction grid padded to a rectangle with [`EMPTY_CELL`].
    pub fn normalized_cons_layout(&self) -> Grid {
        transform::normalize_grid(&self.cons_layout)
    }

    /// Sample both grids at `(row, col)` and resolve the cell glyph's
    /// check-type, if any. Ragged rows are normalized internally.
    pub fn sample_layout(&self, row: usize, col: usize) -> LayoutSample<'_> {
        let cell = grid_at(&self.normalized_cell_layout(), row, col);
        let cons = grid_at(&self.normalized_cons_layout(), row, col);
        let check_type = cell
            .filter(|&glyph| glyph != EMPTY_CELL)
            .and_then(|glyph| self.check_types.iter().find(|ct| ct.symbol == glyph));
        LayoutSample {
            row,
            col,
            cell,
            cons,
            check_type,
        }
    }
}

fn grid_at(grid: &Grid, row: usize, col: usize) -> Option<char> {
    grid.get(row).and_then(|r| r.chars().nth(col))
}

/// A rotation ring of piece ids with its supplementary add-type rings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ordering {
    pub rotation_ring: Vec<u32>,
    pub add_types: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub orderings: Vec<Ordering>,
    pub pieces: BTreeMap<u32, PuzzlePiece>,
}

impl Record {
    pub fn piece(&self, id: u32) -> Option<&PuzzlePiece> {
        self.pieces.get(&id)
    }
}

pub fn parse(data: &[u8]) -> Result<Record> {
    debug!("RUL0: {} bytes", data.len());
    let mut record = Record::default();
    ini::parse(data, |section, key, value| {
        handle_triple(&mut record, section, key, value)
    })?;
    transform::run_pipeline(&mut record);
    Ok(record)
}

fn handle_triple(record: &mut Record, section: &str, key: &str, value: &str) -> bool {
    if section.is_empty() || section.eq_ignore_ascii_case(ORDERING_SECTION) {
        return handle_ordering(record, key, value);
    }
    if starts_with_ignore_case(section, INTERSECTION_PREFIX) {
        let id = parse_hex_loose(&section[INTERSECTION_PREFIX.len()..]);
        let piece = record.pieces.entry(id).or_insert_with(|| PuzzlePiece {
            id,
            ..PuzzlePiece::default()
        });
        return handle_piece_key(piece, key, value);
    }
    // Sections other than the two recognized shapes are ignored.
    true
}

fn handle_ordering(record: &mut Record, key: &str, value: &str) -> bool {
    if key.eq_ignore_ascii_case("RotationRing") {
        record.orderings.push(Ordering {
            rotation_ring: parse_id_list(value),
            add_types: Vec::new(),
        });
        return true;
    }
    if key.eq_ignore_ascii_case("AddTypes") {
        let Some(ordering) = record.orderings.last_mut() else {
            // AddTypes before any RotationRing is malformed.
            return false;
        };
        ordering.add_types.push(parse_id_list(value));
        return true;
    }
    false
}

fn handle_piece_key(piece: &mut PuzzlePiece, key: &str, value: &str) -> bool {
    if key.eq_ignore_ascii_case("Piece") {
        // A malformed Piece line leaves the effect untouched.
        parse_piece_value(value, &mut piece.effect);
        true
    } else if key.eq_ignore_ascii_case("PreviewEffect") {
        piece.effect.name = value.to_string();
        true
    } else if key.eq_ignore_ascii_case("CellLayout") {
        piece.cell_layout.push(value.to_string());
        true
    } else if key.eq_ignore_ascii_case("ConsLayout") {
        piece.cons_layout.push(value.to_string());
        true
    } else if key.eq_ignore_ascii_case("CheckType") {
        match parse_check_type(value) {
            Some(check_type) => {
                piece.check_types.push(check_type);
                true
            }
            None => false,
        }
    } else if key.eq_ignore_ascii_case("AutoPathBase") {
        assign_hex(value, &mut piece.auto_path_base)
    } else if key.eq_ignore_ascii_case("AutoTileBase") {
        assign_hex(value, &mut piece.auto_tile_base)
    } else if starts_with_ignore_case(key, "ReplacementIntersection") {
        let Some((rotation, flip)) = parse_decimal_pair(value) else {
            return false;
        };
        let Some(rotation) = Rotation::from_value(rotation) else {
            return false;
        };
        let Ok(flip) = u32::try_from(flip) else {
            return false;
        };
        piece.replacement_intersection = ReplacementIntersection {
            initialized: true,
            rotation,
            flip,
        };
        true
    } else if key.eq_ignore_ascii_case("PlaceQueryId") {
        assign_hex(value, &mut piece.place_query_id)
    } else if key.eq_ignore_ascii_case("Costs") {
        if value.is_empty() {
            piece.costs = 0;
            return true;
        }
        match parse_decimal(value) {
            Some(costs) => {
                piece.costs = costs as u32;
                true
            }
            None => false,
        }
    } else if key.eq_ignore_ascii_case("ConvertQueryId") {
        assign_hex(value, &mut piece.convert_query_id)
    } else if key.eq_ignore_ascii_case("AutoPlace") {
        match parse_decimal(value) {
            Some(flag) => {
                piece.auto_place = flag != 0;
                true
            }
            None => false,
        }
    } else if key.eq_ignore_ascii_case("HandleOffset") {
        // Malformed pairs are ignored rather than fatal.
        if let Some((a, b)) = parse_decimal_pair(value) {
            if let (Ok(delta_straight), Ok(delta_side)) = (i32::try_from(a), i32::try_from(b)) {
                piece.handle_offset = HandleOffset {
                    initialized: true,
                    delta_straight,
                    delta_side,
                };
            }
        }
        true
    } else if key.eq_ignore_ascii_case("StepOffsets") {
        if let Some((a, b)) = parse_decimal_pair(value) {
            if let (Ok(drag_start_threshold), Ok(drag_completion_offset)) =
                (u32::try_from(a), u32::try_from(b))
            {
                piece.step_offsets = StepOffsets {
                    initialized: true,
                    drag_start_threshold,
                    drag_completion_offset,
                };
            }
        }
        true
    } else if key.eq_ignore_ascii_case("OneWayDir") {
        let Some(dir) = parse_decimal(value).and_then(OneWayDir::from_value) else {
            return false;
        };
        piece.one_way_dir = dir;
        true
    } else if key.eq_ignore_ascii_case("CopyFrom") {
        assign_hex(value, &mut piece.copy_from)
    } else if key.eq_ignore_ascii_case("Rotate") {
        let Some(rotation) = parse_decimal(value).and_then(Rotation::from_value) else {
            return false;
        };
        piece.rotate = rotation;
        true
    } else if key.eq_ignore_ascii_case("Transpose") {
        match parse_decimal(value) {
            Some(flag) => {
                piece.transpose = flag != 0;
                true
            }
            None => false,
        }
    } else if key.eq_ignore_ascii_case("Translate") {
        if let Some((x, z)) = parse_decimal_pair(value) {
            if let (Ok(x), Ok(z)) = (u32::try_from(x), u32::try_from(z)) {
                piece.translate = Translation {
                    initialized: true,
                    x,
                    z,
                };
            }
        }
        true
    } else {
        // Unknown keys inside a recognized section are fatal.
        false
    }
}

fn assign_hex(value: &str, target: &mut u32) -> bool {
    match parse_hex_strict(value) {
        Some(parsed) => {
            *target = parsed;
            true
        }
        None => false,
    }
}

/// `Piece=x,y,rotation,flip,instanceId`, with an optional `;` comment tail.
fn parse_piece_value(value: &str, effect: &mut PreviewEffect) -> bool {
    let value = match value.find(';') {
        Some(semi) => &value[..semi],
        None => value,
    };

    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 5 {
        return false;
    }

    let (Some(x), Some(y)) = (parse_float(parts[0]), parse_float(parts[1])) else {
        return false;
    };
    let (Some(rotation), Some(flip)) = (parse_int_auto(parts[2]), parse_int_auto(parts[3])) else {
        return false;
    };
    let Some(instance_id) = parse_hex_strict(parts[4]) else {
        return false;
    };
    let (Ok(rotation), Ok(flip)) = (i32::try_from(rotation), i32::try_from(flip)) else {
        return false;
    };

    effect.initialized = true;
    effect.x = x;
    effect.y = y;
    effect.rotation = rotation;
    effect.flip = flip;
    effect.instance_id = instance_id;
    true
}

/// `G-net1:flagsHex[,maskHex] [optional] [check] [net2:…]`. The glyph before
/// the dash binds the checks to cell-grid cells.
fn parse_check_type(value: &str) -> Option<CheckType> {
    let mut chars = value.chars();
    let symbol = chars.next()?;
    let mut check_type = CheckType {
        symbol,
        networks: Vec::new(),
    };

    let Some(dash) = value.find('-') else {
        return Some(check_type);
    };
    let mut rest = &value[dash + 1..];

    loop {
        let token = next_token(&mut rest);
        if token.is_empty() {
            break;
        }

        if token == "optional" {
            if let Some(network) = check_type.networks.last_mut() {
                network.optional = true;
            }
        } else if token == "check" {
            if let Some(network) = check_type.networks.last_mut() {
                network.check = true;
            }
        } else if consume_char(&mut rest, ':') {
            let mut network = NetworkCheck {
                network: NetworkType::from_name(token),
                ..NetworkCheck::default()
            };
            let flags = next_token(&mut rest);
            network.rule_flags = parse_hex_strict(flags)?;
            if consume_char(&mut rest, ',') {
                let mask = next_token(&mut rest);
                // The game reads at most "0x" plus eight digits here.
                let mask = mask.get(..mask.len().min(10)).unwrap_or(mask);
                network.hex_mask = parse_hex_strict(mask)?;
            }
            check_type.networks.push(network);
        }
    }

    Some(check_type)
}

fn next_token<'a>(rest: &mut &'a str) -> &'a str {
    *rest = rest.trim_start_matches([' ', '\t']);
    let end = rest
        .find([' ', '\t', ',', ':'])
        .unwrap_or(rest.len());
    let token = &rest[..end];
    *rest = &rest[end..];
    token
}

fn consume_char(rest: &mut &str, c: char) -> bool {
    *rest = rest.trim_start_matches([' ', '\t']);
    if let Some(stripped) = rest.strip_prefix(c) {
        *rest = stripped;
        return true;
    }
    false
}

/// Comma-separated hex ids, each with an optional `0x` prefix.
fn parse_id_list(value: &str) -> Vec<u32> {
    value.split(',').map(parse_hex_loose).collect()
}

/// `strtoul(…, 16)` semantics: optional `0x`, leading hex digits, anything
/// after the digit run ignored, 0 when there are no digits at all.
fn parse_hex_loose(text: &str) -> u32 {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let digits: String = text.chars().take_while(char::is_ascii_hexdigit).collect();
    if digits.is_empty() {
        return 0;
    }
    u64::from_str_radix(&digits[..digits.len().min(16)], 16).unwrap_or(u64::MAX) as u32
}

/// Full-match hex with optional `0x` prefix; at least one digit required.
fn parse_hex_strict(text: &str) -> Option<u32> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if text.is_empty() {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

/// Full-match signed decimal.
fn parse_decimal(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// `a,b` pair of full-match decimals.
fn parse_decimal_pair(value: &str) -> Option<(i64, i64)> {
    let (a, b) = value.split_once(',')?;
    Some((parse_decimal(a)?, parse_decimal(b)?))
}

/// `%i` semantics: decimal, octal with a leading `0`, or hex with `0x`.
fn parse_int_auto(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()?
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(&text[1..], 8).ok()?
    } else {
        text.parse().ok()?
    };
    Some(if negative { -value } else { value })
}

fn parse_float(text: &str) -> Option<f32> {
    text.trim().parse().ok()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}
