//! Post-parse transformation pipeline.
//!
//! Pieces are processed in ascending id order so that `CopyFrom` sources,
//! which carry lower ids, are already resolved when their dependents run.
//! For each piece the declarative transform is snapshotted, copy-from is
//! resolved, and rotate, transpose and translate are applied in that order,
//! each step clearing its declarative field so a second run is a no-op.

use tracing::trace;

use super::{
    EMPTY_CELL, Grid, OneWayDir, PuzzlePiece, Record, Rotation, Transform,
};

/// Pad ragged rows to the width of the widest row.
pub(super) fn normalize_grid(grid: &Grid) -> Grid {
    if grid.is_empty() {
        return Vec::new();
    }
    let width = grid.iter().map(|row| row.chars().count()).max().unwrap_or(0);
    grid.iter()
        .map(|row| {
            let mut padded: Vec<char> = row.chars().collect();
            padded.resize(width, EMPTY_CELL);
            padded.into_iter().collect()
        })
        .collect()
}

fn to_cells(grid: &Grid) -> Vec<Vec<char>> {
    normalize_grid(grid)
        .iter()
        .map(|row| row.chars().collect())
        .collect()
}

fn from_cells(cells: Vec<Vec<char>>) -> Grid {
    cells.into_iter().map(|row| row.into_iter().collect()).collect()
}

fn rotate_cells_90(cells: &[Vec<char>]) -> Vec<Vec<char>> {
    if cells.is_empty() {
        return Vec::new();
    }
    let height = cells.len();
    let width = cells[0].len();
    let mut rotated = vec![vec![EMPTY_CELL; height]; width];
    for (y, row) in cells.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            rotated[x][height - 1 - y] = cell;
        }
    }
    rotated
}

fn rotate_grid(grid: &Grid, times: u32) -> Grid {
    let mut cells = to_cells(grid);
    for _ in 0..times % 4 {
        cells = rotate_cells_90(&cells);
    }
    from_cells(cells)
}

fn transpose_grid(grid: &Grid) -> Grid {
    let cells = to_cells(grid);
    if cells.is_empty() {
        return Vec::new();
    }
    let height = cells.len();
    let width = cells[0].len();
    let mut transposed = vec![vec![EMPTY_CELL; height]; width];
    for (y, row) in cells.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            transposed[x][y] = cell;
        }
    }
    from_cells(transposed)
}

/// Grow the grid by `dz` rows on top and `dx` columns on the left.
fn translate_grid(grid: &Grid, dx: u32, dz: u32) -> Grid {
    let cells = to_cells(grid);
    if cells.is_empty() || (dx == 0 && dz == 0) {
        return from_cells(cells);
    }
    let height = cells.len();
    let width = cells[0].len();
    let (dx, dz) = (dx as usize, dz as usize);

    let mut translated = vec![vec![EMPTY_CELL; width + dx]; height + dz];
    for (y, row) in cells.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            translated[y + dz][x + dx] = cell;
        }
    }
    from_cells(translated)
}

/// Rotate a point by quarter turns clockwise around the origin.
fn rotate_point(x: &mut f32, y: &mut f32, times: u32) {
    match times % 4 {
        1 => {
            let temp = *y;
            *y = *x;
            *x = -temp;
        }
        2 => {
            *x = -*x;
            *y = -*y;
        }
        3 => {
            let temp = *x;
            *x = *y;
            *y = -temp;
        }
        _ => {}
    }
}

/// Byte-wise cyclic rotation of a 32-bit edge-flag word: each quarter turn
/// shifts the four 8-bit edge slots one position.
pub fn rotate_edge_flags(flags: u32, times: u32) -> u32 {
    flags.rotate_left((times % 4) * 8)
}

/// Permute the `[S, E, N, W]` edge slots (high to low) to `[E, S, W, N]`.
pub fn transpose_edge_flags(flags: u32) -> u32 {
    let south = (flags >> 24) & 0xFF;
    let east = (flags >> 16) & 0xFF;
    let north = (flags >> 8) & 0xFF;
    let west = flags & 0xFF;
    (east << 24) | (south << 16) | (west << 8) | north
}

fn transpose_one_way(dir: OneWayDir) -> OneWayDir {
    match dir {
        OneWayDir::West => OneWayDir::North,
        OneWayDir::North => OneWayDir::West,
        OneWayDir::NorthEast => OneWayDir::SouthWest,
        OneWayDir::SouthWest => OneWayDir::NorthEast,
        OneWayDir::East => OneWayDir::South,
        OneWayDir::South => OneWayDir::East,
        other => other,
    }
}

/// Copy the payload fields from `source` into `dest`. The destination keeps
/// its own id, `place_query_id` and pending declarative transform.
fn copy_piece_fields(source: &PuzzlePiece, dest: &mut PuzzlePiece) {
    dest.effect = source.effect.clone();
    dest.cell_layout = source.cell_layout.clone();
    dest.cons_layout = source.cons_layout.clone();
    dest.check_types = source.check_types.clone();

    dest.auto_path_base = source.auto_path_base;
    dest.auto_tile_base = source.auto_tile_base;
    dest.replacement_intersection = source.replacement_intersection;
    dest.costs = source.costs;
    dest.convert_query_id = source.convert_query_id;
    dest.auto_place = source.auto_place;
    dest.handle_offset = source.handle_offset;
    dest.step_offsets = source.step_offsets;
    dest.one_way_dir = source.one_way_dir;
}

fn apply_rotation(piece: &mut PuzzlePiece) {
    let times = piece.rotate.quarter_turns();
    piece.rotate = Rotation::None;
    if times == 0 {
        return;
    }

    if !piece.cell_layout.is_empty() {
        piece.cell_layout = rotate_grid(&piece.cell_layout, times);
    }
    if !piece.cons_layout.is_empty() {
        piece.cons_layout = rotate_grid(&piece.cons_layout, times);
    }

    if piece.effect.initialized {
        rotate_point(&mut piece.effect.x, &mut piece.effect.y, times);
        piece.effect.rotation = (piece.effect.rotation + times as i32 * 90) % 360;
    }

    if piece.one_way_dir != OneWayDir::None {
        let value = piece.one_way_dir.value();
        if value < 8 {
            let rotated = (i64::from(value) + i64::from(times) * 2) % 8;
            if let Some(dir) = OneWayDir::from_value(rotated) {
                piece.one_way_dir = dir;
            }
        }
    }

    for check_type in &mut piece.check_types {
        for network in &mut check_type.networks {
            network.rule_flags = rotate_edge_flags(network.rule_flags, times);
            network.hex_mask = rotate_edge_flags(network.hex_mask, times);
        }
    }
}

fn apply_transpose(piece: &mut PuzzlePiece) {
    if !piece.transpose {
        return;
    }
    piece.transpose = false;

    if !piece.cell_layout.is_empty() {
        piece.cell_layout = transpose_grid(&piece.cell_layout);
    }
    if !piece.cons_layout.is_empty() {
        piece.cons_layout = transpose_grid(&piece.cons_layout);
    }

    if piece.effect.initialized {
        std::mem::swap(&mut piece.effect.x, &mut piece.effect.y);
        piece.effect.flip = if piece.effect.flip == 0 { 1 } else { 0 };
    }

    if piece.one_way_dir != OneWayDir::None {
        piece.one_way_dir = transpose_one_way(piece.one_way_dir);
    }

    for check_type in &mut piece.check_types {
        for network in &mut check_type.networks {
            network.rule_flags = transpose_edge_flags(network.rule_flags);
            network.hex_mask = transpose_edge_flags(network.hex_mask);
        }
    }
}

fn apply_translation(piece: &mut PuzzlePiece) {
    if !piece.translate.initialized {
        return;
    }
    let (dx, dz) = (piece.translate.x, piece.translate.z);
    piece.translate.initialized = false;

    if !piece.cell_layout.is_empty() {
        piece.cell_layout = translate_grid(&piece.cell_layout, dx, dz);
    }
    if !piece.cons_layout.is_empty() {
        piece.cons_layout = translate_grid(&piece.cons_layout, dx, dz);
    }

    if piece.effect.initialized {
        piece.effect.x += dx as f32;
        piece.effect.y += dz as f32;
    }
}

/// Resolve copy-from and apply each piece's transform, in ascending id
/// order so sources are finished before their dependents.
pub(super) fn run_pipeline(record: &mut Record) {
    let ids: Vec<u32> = record.pieces.keys().copied().collect();

    for id in ids {
        let Some(piece) = record.pieces.get(&id) else {
            continue;
        };
        let requested = Transform {
            copy_from: piece.copy_from,
            rotate: piece.rotate,
            transpose: piece.transpose,
            translate: piece.translate,
        };

        if requested.copy_from != 0 {
            if let Some(source) = record.pieces.get(&requested.copy_from).cloned() {
                trace!("piece {id:#x} copies from {:#x}", requested.copy_from);
                if let Some(dest) = record.pieces.get_mut(&id) {
                    copy_piece_fields(&source, dest);
                }
            }
        }

        let Some(piece) = record.pieces.get_mut(&id) else {
            continue;
        };
        piece.requested_transform = requested;
        piece.applied_transform = requested;

        apply_rotation(piece);
        apply_transpose(piece);
        apply_translation(piece);
    }
}
