use super::config::ScreeningConfig;
use crate::core::geometry::GeometryError;
use crate::core::geometry::bonds::{bad_bond_pairs, bond_pairs, is_geometry_reasonable};
use crate::core::geometry::clusters::connected_clusters_with;
use crate::core::models::structure::Structure;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{info, instrument};

/// Geometry diagnostics of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub index: usize,
    pub reasonable: bool,
    pub num_bonds: usize,
    pub bad_bonds: Vec<(usize, usize)>,
    pub num_clusters: usize,
    pub num_organic_clusters: usize,
}

impl FrameReport {
    /// Unreasonable, or holding at least one bad bond.
    pub fn is_flagged(&self) -> bool {
        !self.reasonable || !self.bad_bonds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreeningReport {
    pub frames: Vec<FrameReport>,
}

impl ScreeningReport {
    /// Indices of the frames that failed the reasonableness check.
    pub fn unreasonable_indices(&self) -> Vec<usize> {
        self.frames
            .iter()
            .filter(|frame| !frame.reasonable)
            .map(|frame| frame.index)
            .collect()
    }

    /// Indices of the frames with at least one bad bond.
    pub fn frames_with_bad_bonds(&self) -> Vec<usize> {
        self.frames
            .iter()
            .filter(|frame| !frame.bad_bonds.is_empty())
            .map(|frame| frame.index)
            .collect()
    }
}

/// Screens every frame for unphysical contacts and reports its bonding
/// and cluster statistics.
#[instrument(skip_all, name = "screening_workflow")]
pub fn run(
    structures: &[Structure],
    config: &ScreeningConfig,
    reporter: &ProgressReporter,
) -> Result<ScreeningReport, EngineError> {
    let report = reporter.phase("Screening", || {
        reporter.report(Progress::FramesStart {
            total: structures.len(),
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = structures.iter().enumerate();

        #[cfg(feature = "parallel")]
        let iterator = structures.par_iter().enumerate();

        let frames = iterator
            .map(|(index, structure)| {
                let report = screen_frame(index, structure, config).map_err(|source| {
                    EngineError::Geometry {
                        structure: index,
                        source,
                    }
                })?;
                reporter.report(Progress::FrameDone {
                    index,
                    flagged: report.is_flagged(),
                });
                Ok::<_, EngineError>(report)
            })
            .collect::<Result<Vec<_>, _>>();

        let report = ScreeningReport { frames: frames? };
        reporter.report(Progress::Summary {
            checked: report.frames.len(),
            flagged: report.frames.iter().filter(|f| f.is_flagged()).count(),
        });
        Ok::<_, EngineError>(report)
    })?;

    let unreasonable = report.unreasonable_indices().len();
    info!(
        num_frames = report.frames.len(),
        unreasonable, "Screening complete."
    );
    Ok(report)
}

fn screen_frame(
    index: usize,
    structure: &Structure,
    config: &ScreeningConfig,
) -> Result<FrameReport, GeometryError> {
    let reasonable = is_geometry_reasonable(structure, config.reasonable_coefficient)?;
    let num_bonds = bond_pairs(structure, config.bond_tolerance)?.len();
    let clusters = connected_clusters_with(structure, &config.cutoffs)?;
    let mut bad_bonds = bad_bond_pairs(structure, config.bad_bond_coefficient)?;

    if config.organic_only {
        let mut organic = vec![false; structure.num_atoms()];
        for (members, is_organic) in clusters.iter() {
            if is_organic {
                for &atom in members {
                    organic[atom] = true;
                }
            }
        }
        bad_bonds.retain(|&(i, j)| organic[i] && organic[j]);
    }

    Ok(FrameReport {
        index,
        reasonable,
        num_bonds,
        bad_bonds,
        num_clusters: clusters.len(),
        num_organic_clusters: clusters.organic_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::config::ScreeningConfigBuilder;
    use nalgebra::{Matrix3, Vector3};
    use std::sync::Mutex;

    fn cube(edge: f64) -> Option<Matrix3<f64>> {
        Some(Matrix3::from_diagonal(&Vector3::new(edge, edge, edge)))
    }

    fn methane_near_copper(copper_offset: f64) -> Structure {
        Structure::new(
            cube(15.0),
            vec!["C".into(), "H".into(), "H".into(), "H".into(), "H".into(), "Cu".into()],
            vec![
                Vector3::new(5.0, 5.0, 5.0),
                Vector3::new(5.63, 5.63, 5.63),
                Vector3::new(4.37, 4.37, 5.63),
                Vector3::new(4.37, 5.63, 4.37),
                Vector3::new(5.63, 4.37, 4.37),
                Vector3::new(5.63 + copper_offset, 5.63, 5.63),
            ],
        )
        .unwrap()
    }

    #[test]
    fn run_flags_frames_with_overlapping_atoms() {
        let frames = vec![
            methane_near_copper(5.0),
            methane_near_copper(0.4),
            methane_near_copper(6.0),
        ];
        let report = run(&frames, &ScreeningConfig::default(), &ProgressReporter::new()).unwrap();

        assert_eq!(report.frames.len(), 3);
        assert_eq!(report.unreasonable_indices(), vec![1]);
        assert_eq!(report.frames_with_bad_bonds(), vec![1]);
        assert_eq!(report.frames[1].bad_bonds, vec![(0, 5), (1, 5)]);

        let relaxed = &report.frames[0];
        assert_eq!(relaxed.index, 0);
        assert_eq!(relaxed.num_bonds, 4);
        assert_eq!(relaxed.num_clusters, 2);
        assert_eq!(relaxed.num_organic_clusters, 1);
    }

    #[test]
    fn organic_only_ignores_contacts_outside_organic_clusters() {
        let mut species = methane_near_copper(5.0).species().to_vec();
        let mut positions = methane_near_copper(5.0).positions().to_vec();
        species.pop();
        positions.pop();
        species.extend(["Cu".to_string(), "Cu".to_string()]);
        positions.extend([Vector3::new(11.0, 11.0, 11.0), Vector3::new(12.0, 11.0, 11.0)]);
        let frame = Structure::new(cube(15.0), species, positions).unwrap();

        let everything = run(&[frame.clone()], &ScreeningConfig::default(), &ProgressReporter::new()).unwrap();
        assert_eq!(everything.frames[0].bad_bonds, vec![(5, 6)]);

        let config = ScreeningConfigBuilder::new().organic_only(true).build().unwrap();
        let organic = run(&[frame], &config, &ProgressReporter::new()).unwrap();
        assert!(organic.frames[0].bad_bonds.is_empty());
        assert_eq!(organic.unreasonable_indices(), vec![0]);
    }

    #[test]
    fn run_reports_progress_for_every_frame() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));
        let frames = vec![
            methane_near_copper(5.0),
            methane_near_copper(0.4),
            methane_near_copper(5.0),
            methane_near_copper(6.0),
        ];
        run(&frames, &ScreeningConfig::default(), &reporter).unwrap();
        drop(reporter);

        let events = events.into_inner().unwrap();
        let mut flagged: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                Progress::FrameDone { index, flagged } => flagged.then_some(*index),
                _ => None,
            })
            .collect();
        flagged.sort_unstable();
        let done = events
            .iter()
            .filter(|event| matches!(event, Progress::FrameDone { .. }))
            .count();

        assert_eq!(done, 4);
        assert_eq!(flagged, vec![1]);
        assert_eq!(events[1], Progress::FramesStart { total: 4 });
        assert_eq!(
            events[events.len() - 2],
            Progress::Summary {
                checked: 4,
                flagged: 1
            }
        );
    }

    #[test]
    fn unknown_elements_fail_with_the_frame_index() {
        let frames = vec![
            methane_near_copper(5.0),
            Structure::new(cube(10.0), vec!["Xx".into()], vec![Vector3::zeros()]).unwrap(),
        ];
        assert!(matches!(
            run(&frames, &ScreeningConfig::default(), &ProgressReporter::new()),
            Err(EngineError::Geometry {
                structure: 1,
                source: GeometryError::UnknownElement(_)
            })
        ));
    }
}
