use crate::core::geometry::lattice;
use crate::core::models::fields::{FieldValue, GlobalFields};
use crate::core::models::properties::{AtomArray, PropertyKind, PropertySpec};
use crate::core::models::structure::{ModelError, POSITIONS_KEY, SPECIES_KEY, Structure};
use npyz::{DType, NpyFile, Order, TypeChar, WriterBuilder};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const TYPE_FILE: &str = "type.raw";
const TYPE_MAP_FILE: &str = "type_map.raw";
const NOPBC_FILE: &str = "nopbc";
const BOX_STEM: &str = "box";
const COORD_STEM: &str = "coord";
const DEFAULT_GROUP: &str = "default";

/// Arrays that always hold one value set per frame, whatever their width.
const FRAME_STEMS: [&str; 6] = [
    "energy",
    "virial",
    "stress",
    "dipole",
    "polarizability",
    "fparam",
];

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to decode array '{path}': {reason}")]
    Npy { path: PathBuf, reason: String },
    #[error("Shape mismatch in '{path}' for '{name}': expected {expected}, found {found}")]
    ShapeMismatch {
        path: PathBuf,
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Dataset '{path}' is missing the required array '{name}'")]
    MissingArray { path: PathBuf, name: &'static str },
    #[error("Invalid type file '{path}': {reason}")]
    InvalidTypeFile { path: PathBuf, reason: String },
    #[error("Frame {frame} of group '{config_type}' has a different species sequence than the first frame")]
    InconsistentSpecies { config_type: String, frame: usize },
    #[error("Shard size must be at least 1")]
    InvalidShardSize,
    #[error("Invalid structure: {0}")]
    Structure(#[from] ModelError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> NpyError + '_ {
    move |source| NpyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A stacked array: `rows` frames of `cols` values each, row-major.
///
/// `per_frame_axis` is set when the file stored each frame as its own row
/// (two or more dimensions) rather than as a single scalar.
#[derive(Debug, Clone, PartialEq)]
struct FrameArray {
    rows: usize,
    cols: usize,
    per_frame_axis: bool,
    data: Vec<f64>,
}

impl FrameArray {
    fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }
}

/// Returns `true` if `path` is a dataset directory or directly contains one.
pub fn is_npy_dataset<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    if path.join(TYPE_FILE).is_file() {
        return true;
    }
    match sorted_subdirectories(path) {
        Ok(children) => children.iter().any(|child| child.join(TYPE_FILE).is_file()),
        Err(_) => false,
    }
}

/// Loads every frame below `path`.
///
/// A directory holding `type.raw` is read as one dataset whose frames get
/// the directory name as `config_type`; any other directory is searched
/// recursively in name order. Paths that are not directories yield nothing.
#[instrument(skip_all, name = "npy_load")]
pub fn load_npy_structure<P: AsRef<Path>>(path: P) -> Result<Vec<Structure>, NpyError> {
    let path = path.as_ref();
    if path.join(TYPE_FILE).is_file() {
        return load_dataset_dir(path);
    }
    if !path.is_dir() {
        return Ok(Vec::new());
    }
    let mut structures = Vec::new();
    for child in sorted_subdirectories(path).map_err(io_error(path))? {
        structures.extend(load_npy_structure(&child)?);
    }
    Ok(structures)
}

fn sorted_subdirectories(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(path)? {
        let child = entry?.path();
        if child.is_dir() {
            children.push(child);
        }
    }
    children.sort();
    Ok(children)
}

fn load_dataset_dir(dir: &Path) -> Result<Vec<Structure>, NpyError> {
    let species = read_species(dir)?;
    let num_atoms = species.len();
    let nopbc = dir.join(NOPBC_FILE).exists();
    let config_type = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut arrays = read_sets(dir)?;
    let boxes = arrays.remove(BOX_STEM).ok_or(NpyError::MissingArray {
        path: dir.to_path_buf(),
        name: BOX_STEM,
    })?;
    let coords = arrays.remove(COORD_STEM).ok_or(NpyError::MissingArray {
        path: dir.to_path_buf(),
        name: COORD_STEM,
    })?;

    let num_frames = boxes.rows;
    let check = |name: &str, array: &FrameArray, cols: Option<usize>| {
        if array.rows != num_frames {
            return Err(NpyError::ShapeMismatch {
                path: dir.to_path_buf(),
                name: name.to_string(),
                expected: num_frames,
                found: array.rows,
            });
        }
        match cols {
            Some(cols) if array.cols != cols => Err(NpyError::ShapeMismatch {
                path: dir.to_path_buf(),
                name: name.to_string(),
                expected: cols,
                found: array.cols,
            }),
            _ => Ok(()),
        }
    };
    check(BOX_STEM, &boxes, Some(9))?;
    check(COORD_STEM, &coords, Some(3 * num_atoms))?;
    for (stem, array) in &arrays {
        check(stem, array, None)?;
    }

    let mut frames = Vec::with_capacity(num_frames);
    for index in 0..num_frames {
        let cell = boxes.row(index);
        let lattice = if nopbc && cell.iter().all(|&v| v == 0.0) {
            None
        } else {
            lattice::lattice_from_rows(cell)
        };

        let mut fields = GlobalFields::new();
        fields.config_type = config_type.clone();
        fields.pbc = Some([!nopbc; 3]);

        let mut columns = vec![
            (
                PropertySpec::new(SPECIES_KEY, PropertyKind::Str, 1),
                AtomArray::Text(species.clone()),
            ),
            (
                PropertySpec::new(POSITIONS_KEY, PropertyKind::Real, 3),
                AtomArray::Real(coords.row(index).to_vec()),
            ),
        ];

        for (stem, array) in &arrays {
            let values = array.row(index);
            let per_atom = !FRAME_STEMS.contains(&stem.as_str())
                && num_atoms > 0
                && (array.cols > 1 || array.per_frame_axis)
                && array.cols % num_atoms == 0;
            if per_atom {
                columns.push((
                    PropertySpec::new(stem, PropertyKind::Real, array.cols / num_atoms),
                    AtomArray::Real(values.to_vec()),
                ));
                continue;
            }
            match (stem.as_str(), values) {
                ("energy", [energy]) => fields.energy = Some(*energy),
                ("virial", _) => fields.virial = Some(values.to_vec()),
                ("stress", _) => fields.stress = Some(values.to_vec()),
                (_, [value]) => fields.set_extra(stem, FieldValue::Number(*value)),
                _ => fields.set_extra(stem, FieldValue::Vector(values.to_vec())),
            }
        }

        frames.push(Structure::from_columns(lattice, columns, fields)?);
    }

    debug!(
        num_frames = frames.len(),
        path = %dir.display(),
        "Loaded dataset directory."
    );
    Ok(frames)
}

fn read_species(dir: &Path) -> Result<Vec<String>, NpyError> {
    let type_path = dir.join(TYPE_FILE);
    let text = fs::read_to_string(&type_path).map_err(io_error(&type_path))?;
    let types = text
        .split_whitespace()
        .map(|token| {
            token.parse::<usize>().map_err(|_| NpyError::InvalidTypeFile {
                path: type_path.clone(),
                reason: format!("'{}' is not a type index", token),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let map_path = dir.join(TYPE_MAP_FILE);
    let type_map: Vec<String> = if map_path.is_file() {
        fs::read_to_string(&map_path)
            .map_err(io_error(&map_path))?
            .split_whitespace()
            .map(str::to_string)
            .collect()
    } else {
        let max = types.iter().copied().max().map_or(0, |m| m + 1);
        (0..max).map(|t| format!("E{}", t + 1)).collect()
    };

    types
        .iter()
        .map(|&t| {
            type_map
                .get(t)
                .cloned()
                .ok_or_else(|| NpyError::InvalidTypeFile {
                    path: map_path.clone(),
                    reason: format!("type index {} has no entry in the type map", t),
                })
        })
        .collect()
}

/// Reads every `set.*/<stem>.npy` and stacks arrays with the same stem.
fn read_sets(dir: &Path) -> Result<BTreeMap<String, FrameArray>, NpyError> {
    let sets: Vec<PathBuf> = sorted_subdirectories(dir)
        .map_err(io_error(dir))?
        .into_iter()
        .filter(|set| {
            set.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("set."))
        })
        .collect();

    let mut stacked: BTreeMap<String, FrameArray> = BTreeMap::new();
    for set in sets {
        let mut files = Vec::new();
        for entry in fs::read_dir(&set).map_err(io_error(&set))? {
            let file = entry.map_err(io_error(&set))?.path();
            if file.extension().is_some_and(|ext| ext == "npy") {
                files.push(file);
            }
        }
        files.sort();

        for file in files {
            let Some(stem) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let array = read_array(&file)?;
            match stacked.get_mut(&stem) {
                Some(existing) => {
                    if existing.cols != array.cols {
                        return Err(NpyError::ShapeMismatch {
                            path: file,
                            name: stem,
                            expected: existing.cols,
                            found: array.cols,
                        });
                    }
                    existing.rows += array.rows;
                    existing.data.extend(array.data);
                }
                None => {
                    stacked.insert(stem, array);
                }
            }
        }
    }
    Ok(stacked)
}

fn read_array(path: &Path) -> Result<FrameArray, NpyError> {
    let decode_error = |reason: String| NpyError::Npy {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(io_error(path))?;
    let npy = NpyFile::new(BufReader::new(file)).map_err(|e| decode_error(e.to_string()))?;
    if matches!(npy.order(), Order::Fortran) {
        return Err(decode_error("Fortran-ordered arrays are not supported".into()));
    }

    let shape: Vec<usize> = npy.shape().iter().map(|&d| d as usize).collect();
    let (rows, cols, per_frame_axis) = match shape.as_slice() {
        [] => (1, 1, false),
        [rows] => (*rows, 1, false),
        [rows, rest @ ..] => (*rows, rest.iter().product(), true),
    };

    let data = match npy.dtype() {
        DType::Plain(ts) => match (ts.type_char(), ts.size_field()) {
            (TypeChar::Float, 8) => npy.into_vec::<f64>(),
            (TypeChar::Float, 4) => npy
                .into_vec::<f32>()
                .map(|v| v.into_iter().map(f64::from).collect()),
            (TypeChar::Int, 8) => npy
                .into_vec::<i64>()
                .map(|v| v.into_iter().map(|x| x as f64).collect()),
            (TypeChar::Int, 4) => npy
                .into_vec::<i32>()
                .map(|v| v.into_iter().map(f64::from).collect()),
            _ => return Err(decode_error(format!("unsupported dtype '{}'", ts))),
        },
        other => return Err(decode_error(format!("unsupported dtype {:?}", other))),
    }
    .map_err(|e| decode_error(e.to_string()))?;

    if data.len() != rows * cols {
        return Err(NpyError::ShapeMismatch {
            path: path.to_path_buf(),
            name: "data".to_string(),
            expected: rows * cols,
            found: data.len(),
        });
    }
    Ok(FrameArray {
        rows,
        cols,
        per_frame_axis,
        data,
    })
}

/// Saves frames grouped by `config_type`, one `set.000` per group.
pub fn save_npy_structure<P: AsRef<Path>>(path: P, structures: &[Structure]) -> Result<(), NpyError> {
    save_npy_structure_sharded(path, structures, None)
}

/// Saves frames grouped by `config_type`, splitting each group into
/// `set.000`, `set.001`, ... of at most `shard_size` frames.
///
/// Groups are written in order of first appearance. Each group directory
/// is assembled under a hidden temporary name and renamed into place once
/// complete, replacing any previous directory of the same name.
#[instrument(skip_all, name = "npy_save")]
pub fn save_npy_structure_sharded<P: AsRef<Path>>(
    path: P,
    structures: &[Structure],
    shard_size: Option<usize>,
) -> Result<(), NpyError> {
    if shard_size == Some(0) {
        return Err(NpyError::InvalidShardSize);
    }
    let root = path.as_ref();
    fs::create_dir_all(root).map_err(io_error(root))?;

    let groups = group_by_config_type(structures);
    for (name, frames) in &groups {
        write_group(root, name, frames, shard_size)?;
    }
    info!(
        num_frames = structures.len(),
        num_groups = groups.len(),
        path = %root.display(),
        "Saved dataset."
    );
    Ok(())
}

/// Directory name used for a `config_type`.
fn group_dir_name(config_type: &str) -> String {
    let name = config_type.trim().replace(['/', '\\'], "_");
    match name.as_str() {
        "" => DEFAULT_GROUP.to_string(),
        "." | ".." => name.replace('.', "_"),
        _ => name,
    }
}

fn group_by_config_type(structures: &[Structure]) -> Vec<(String, Vec<&Structure>)> {
    let mut groups: Vec<(String, Vec<&Structure>)> = Vec::new();
    for structure in structures {
        let name = group_dir_name(structure.config_type());
        match groups.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, members)) => members.push(structure),
            None => groups.push((name, vec![structure])),
        }
    }
    groups
}

fn write_group(
    root: &Path,
    name: &str,
    frames: &[&Structure],
    shard_size: Option<usize>,
) -> Result<(), NpyError> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    let num_atoms = first.num_atoms();
    let target = root.join(name);

    for (index, frame) in frames.iter().enumerate() {
        if frame.num_atoms() != num_atoms {
            return Err(NpyError::ShapeMismatch {
                path: target,
                name: COORD_STEM.to_string(),
                expected: 3 * num_atoms,
                found: 3 * frame.num_atoms(),
            });
        }
        if frame.species() != first.species() {
            return Err(NpyError::InconsistentSpecies {
                config_type: name.to_string(),
                frame: index,
            });
        }
    }

    let periodic = frames
        .iter()
        .map(|frame| frame.is_periodic())
        .collect::<Result<Vec<bool>, _>>()?;
    let columns = group_columns(&target, name, frames)?;

    let staging = root.join(format!(".{}.tmp", name));
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(io_error(&staging))?;
    }
    fs::create_dir_all(&staging).map_err(io_error(&staging))?;

    let mut type_map: Vec<&str> = Vec::new();
    for symbol in first.species() {
        if !type_map.contains(&symbol.as_str()) {
            type_map.push(symbol);
        }
    }
    let types: Vec<String> = first
        .species()
        .iter()
        .filter_map(|s| type_map.iter().position(|t| *t == s.as_str()))
        .map(|t| t.to_string())
        .collect();
    write_text(&staging.join(TYPE_MAP_FILE), &type_map.join("\n"))?;
    write_text(&staging.join(TYPE_FILE), &types.join("\n"))?;

    if periodic.iter().all(|&p| !p) {
        write_text(&staging.join(NOPBC_FILE), "")?;
    } else if periodic.iter().any(|&p| !p) {
        warn!(group = name, "Group mixes periodic and non-periodic frames; saving all as periodic.");
    }

    let shard = shard_size.unwrap_or(frames.len()).max(1);
    for (set_index, chunk) in frames.chunks(shard).enumerate() {
        let set_dir = staging.join(format!("set.{:03}", set_index));
        fs::create_dir_all(&set_dir).map_err(io_error(&set_dir))?;
        for column in &columns {
            let start = set_index * shard;
            let rows = chunk.len();
            let data = &column.data[start * column.cols..(start + rows) * column.cols];
            let file = set_dir.join(format!("{}.npy", column.stem));
            write_array(&file, rows, column.cols, column.one_dimensional, data)?;
        }
    }

    if target.exists() {
        fs::remove_dir_all(&target).map_err(io_error(&target))?;
    }
    fs::rename(&staging, &target).map_err(io_error(&target))?;
    debug!(group = name, num_frames = frames.len(), "Wrote dataset group.");
    Ok(())
}

struct Column {
    stem: String,
    cols: usize,
    one_dimensional: bool,
    data: Vec<f64>,
}

/// Collects every array written for a group, all frames stacked.
fn group_columns(dir: &Path, name: &str, frames: &[&Structure]) -> Result<Vec<Column>, NpyError> {
    let num_atoms = frames.first().map_or(0, |f| f.num_atoms());
    let mut columns = vec![
        Column {
            stem: BOX_STEM.to_string(),
            cols: 9,
            one_dimensional: false,
            data: frames
                .iter()
                .flat_map(|f| f.lattice().map_or([0.0; 9], lattice::flatten_rows))
                .collect(),
        },
        Column {
            stem: COORD_STEM.to_string(),
            cols: 3 * num_atoms,
            one_dimensional: false,
            data: frames
                .iter()
                .flat_map(|f| f.positions().iter().flat_map(|p| [p.x, p.y, p.z]))
                .collect(),
        },
    ];

    if let Some(first) = frames.first() {
        for spec in first.schema() {
            if spec.name == SPECIES_KEY || spec.name == first.positions_name() {
                continue;
            }
            if spec.kind != PropertyKind::Real {
                debug!(group = name, property = %spec.name, "Skipping non-real per-atom property.");
                continue;
            }
            let width = num_atoms * spec.count;
            let values: Option<Vec<&[f64]>> = frames
                .iter()
                .map(|f| {
                    f.property(&spec.name)
                        .and_then(AtomArray::as_real)
                        .filter(|v| v.len() == width)
                })
                .collect();
            match values {
                Some(values) => columns.push(Column {
                    stem: spec.name.clone(),
                    cols: width,
                    one_dimensional: false,
                    data: values.concat(),
                }),
                None => warn!(
                    group = name,
                    property = %spec.name,
                    "Per-atom property missing from some frames; not saved."
                ),
            }
        }
    }

    let energies: Option<Vec<f64>> = frames.iter().map(|f| f.fields.energy).collect();
    match energies {
        Some(data) => columns.push(Column {
            stem: "energy".to_string(),
            cols: 1,
            one_dimensional: true,
            data,
        }),
        None if frames.iter().any(|f| f.fields.energy.is_some()) => {
            warn!(group = name, "Energy missing from some frames; not saved.");
        }
        None => {}
    }

    let virials: Option<Vec<Vec<f64>>> = frames.iter().map(|f| f.virial().ok()).collect();
    match virials {
        Some(data) => {
            let width = data.first().map_or(0, Vec::len);
            if let Some(other) = data.iter().find(|v| v.len() != width) {
                return Err(NpyError::ShapeMismatch {
                    path: dir.to_path_buf(),
                    name: "virial".to_string(),
                    expected: width,
                    found: other.len(),
                });
            }
            columns.push(Column {
                stem: "virial".to_string(),
                cols: width,
                one_dimensional: false,
                data: data.concat(),
            });
        }
        None if frames.iter().any(|f| f.virial().is_ok()) => {
            warn!(group = name, "Virial missing from some frames; not saved.");
        }
        None => {}
    }

    Ok(columns)
}

fn write_text(path: &Path, text: &str) -> Result<(), NpyError> {
    let body = if text.is_empty() {
        String::new()
    } else {
        format!("{}\n", text)
    };
    fs::write(path, body).map_err(io_error(path))
}

fn write_array(
    path: &Path,
    rows: usize,
    cols: usize,
    one_dimensional: bool,
    data: &[f64],
) -> Result<(), NpyError> {
    let file = File::create(path).map_err(io_error(path))?;
    let shape = if one_dimensional {
        vec![rows as u64]
    } else {
        vec![rows as u64, cols as u64]
    };
    let mut writer = npyz::WriteOptions::<f64>::new()
        .default_dtype()
        .shape(&shape)
        .writer(BufWriter::new(file))
        .begin_nd()
        .map_err(io_error(path))?;
    writer.extend(data.iter().copied()).map_err(io_error(path))?;
    writer.finish().map_err(io_error(path))
}
