//! Reading point files.
//!
//! A point file is plain text. The first line holds the number of points and
//! is not trusted. Every following line holds the whitespace separated
//! coordinates of one point, three for a 3D file and two for a 2D file. Blank
//! lines are ignored. Other lines that do not hold exactly one point are
//! handled according to [`MalformedRowPolicy`].
use std::io::BufRead;
use std::path::Path;

use crate::{
    Correspondences, DltCalError, MalformedReason, MalformedRow, MalformedRowPolicy, Point2D,
    Point3D, Result,
};

/// A point type which can be read from one line of a point file.
pub trait PointRow: Sized {
    /// Number of values on each line.
    const DIMS: usize;
    /// Build from exactly [`Self::DIMS`] values. `None` for any other count.
    fn from_values(values: &[f64]) -> Option<Self>;
}

impl PointRow for Point3D {
    const DIMS: usize = 3;
    fn from_values(values: &[f64]) -> Option<Self> {
        match *values {
            [x, y, z] => Some(Point3D::new(x, y, z)),
            _ => None,
        }
    }
}

impl PointRow for Point2D {
    const DIMS: usize = 2;
    fn from_values(values: &[f64]) -> Option<Self> {
        match *values {
            [x, y] => Some(Point2D::new(x, y)),
            _ => None,
        }
    }
}

/// Points read from one file, together with the rows that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPoints<P> {
    pub points: Vec<P>,
    pub malformed: Vec<MalformedRow>,
    /// The count from the first line, if it parsed as an integer.
    pub declared_count: Option<usize>,
}

fn parse_row<P: PointRow>(line: &str, line_num: usize) -> std::result::Result<P, MalformedRow> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != P::DIMS {
        return Err(MalformedRow {
            line: line_num,
            reason: MalformedReason::WrongTokenCount {
                expected: P::DIMS,
                found: tokens.len(),
            },
        });
    }
    let mut values = Vec::with_capacity(P::DIMS);
    for token in &tokens {
        // `f64::from_str` also accepts "nan" and "inf".
        let value = token.parse::<f64>().ok().filter(|v| v.is_finite());
        let value = value.ok_or_else(|| MalformedRow {
            line: line_num,
            reason: MalformedReason::InvalidNumber {
                token: token.to_string(),
            },
        })?;
        values.push(value);
    }
    P::from_values(&values).ok_or(MalformedRow {
        line: line_num,
        reason: MalformedReason::WrongTokenCount {
            expected: P::DIMS,
            found: tokens.len(),
        },
    })
}

/// Parse a point file from any buffered reader.
pub fn parse_points<P, R>(rdr: R, policy: MalformedRowPolicy) -> Result<LoadedPoints<P>>
where
    P: PointRow,
    R: BufRead,
{
    let mut points = Vec::new();
    let mut malformed = Vec::new();
    let mut declared_count = None;

    for (i, line) in rdr.lines().enumerate() {
        let line = line?;
        let line_num = i + 1;
        if i == 0 {
            declared_count = line.trim().parse().ok();
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        match parse_row::<P>(&line, line_num) {
            Ok(pt) => points.push(pt),
            Err(row) => match policy {
                MalformedRowPolicy::Fail => return Err(DltCalError::MalformedRow(row)),
                MalformedRowPolicy::Skip => {
                    tracing::warn!("skipping malformed {}D point: {row}", P::DIMS);
                    malformed.push(row);
                }
            },
        }
    }

    if let Some(declared) = declared_count {
        if declared != points.len() {
            tracing::debug!(
                "point file declares {declared} points, {} were read",
                points.len()
            );
        }
    }

    Ok(LoadedPoints {
        points,
        malformed,
        declared_count,
    })
}

/// Read a point file from disk.
pub fn load_points<P, Q>(path: Q, policy: MalformedRowPolicy) -> Result<LoadedPoints<P>>
where
    P: PointRow,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    tracing::debug!("reading {}D points from \"{}\"", P::DIMS, path.display());
    let fd = std::fs::File::open(path)?;
    parse_points(std::io::BufReader::new(fd), policy)
}

pub fn load_points_3d<Q: AsRef<Path>>(
    path: Q,
    policy: MalformedRowPolicy,
) -> Result<LoadedPoints<Point3D>> {
    load_points(path, policy)
}

pub fn load_points_2d<Q: AsRef<Path>>(
    path: Q,
    policy: MalformedRowPolicy,
) -> Result<LoadedPoints<Point2D>> {
    load_points(path, policy)
}

/// Validated correspondences read from a 3D and a 2D point file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCorrespondences {
    pub correspondences: Correspondences,
    pub malformed_3d: Vec<MalformedRow>,
    pub malformed_2d: Vec<MalformedRow>,
}

/// Read both point files and pair them up by index.
pub fn load_correspondences<P1, P2>(
    points_3d: P1,
    points_2d: P2,
    policy: MalformedRowPolicy,
) -> Result<LoadedCorrespondences>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let world = load_points_3d(points_3d, policy)?;
    let image = load_points_2d(points_2d, policy)?;
    let correspondences = Correspondences::new(world.points, image.points)?;
    Ok(LoadedCorrespondences {
        correspondences,
        malformed_3d: world.malformed,
        malformed_2d: image.malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShapeMismatch;

    const WITH_BAD_ROWS: &str = "12
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
1.0 2.0
0.0 0.0 2.0
1.0 0.0 2.0
0.0 1.0 2.0 7.0
0.0 1.0 2.0
1.0 1.0 2.0

0.5 0.5 3.0
2.0 2.0 2.0
";

    #[test]
    fn test_malformed_rows_skipped() {
        let loaded: LoadedPoints<Point3D> =
            parse_points(WITH_BAD_ROWS.as_bytes(), MalformedRowPolicy::Skip).unwrap();
        assert_eq!(loaded.points.len(), 10);
        assert_eq!(loaded.declared_count, Some(12));
        assert_eq!(loaded.points[4], Point3D::new(0.0, 0.0, 2.0));
        assert_eq!(loaded.points[9], Point3D::new(2.0, 2.0, 2.0));

        assert_eq!(
            loaded.malformed,
            vec![
                MalformedRow {
                    line: 6,
                    reason: MalformedReason::WrongTokenCount {
                        expected: 3,
                        found: 2
                    },
                },
                MalformedRow {
                    line: 9,
                    reason: MalformedReason::WrongTokenCount {
                        expected: 3,
                        found: 4
                    },
                },
            ]
        );
    }

    #[test]
    fn test_malformed_rows_fail() {
        let err = parse_points::<Point3D, _>(WITH_BAD_ROWS.as_bytes(), MalformedRowPolicy::Fail)
            .unwrap_err();
        match err {
            DltCalError::MalformedRow(row) => assert_eq!(row.line, 6),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unparsable_number() {
        let buf = "2\n10.5 20.25\n3.0 x4\n";
        let loaded: LoadedPoints<Point2D> =
            parse_points(buf.as_bytes(), MalformedRowPolicy::Skip).unwrap();
        assert_eq!(loaded.points, vec![Point2D::new(10.5, 20.25)]);
        assert_eq!(
            loaded.malformed[0].reason,
            MalformedReason::InvalidNumber {
                token: "x4".to_string()
            }
        );
    }

    #[test]
    fn test_non_finite_values_are_malformed() {
        let buf = "4\n1.0 2.0 3.0\nnan 0 1\n0 inf 1\n-Infinity 1 1\n";
        let loaded: LoadedPoints<Point3D> =
            parse_points(buf.as_bytes(), MalformedRowPolicy::Skip).unwrap();
        assert_eq!(loaded.points, vec![Point3D::new(1.0, 2.0, 3.0)]);
        let lines: Vec<usize> = loaded.malformed.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(
            loaded.malformed[0].reason,
            MalformedReason::InvalidNumber {
                token: "nan".to_string()
            }
        );

        let err = parse_points::<Point3D, _>(buf.as_bytes(), MalformedRowPolicy::Fail).unwrap_err();
        assert!(matches!(err, DltCalError::MalformedRow(MalformedRow { line: 3, .. })));
    }

    #[test]
    fn test_from_values_checks_count() {
        assert_eq!(Point3D::from_values(&[1.0, 2.0]), None);
        assert_eq!(Point2D::from_values(&[]), None);
        assert_eq!(
            Point2D::from_values(&[1.0, 2.0]),
            Some(Point2D::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_header_only_and_bad_header() {
        let loaded: LoadedPoints<Point2D> =
            parse_points("0\n".as_bytes(), MalformedRowPolicy::Fail).unwrap();
        assert!(loaded.points.is_empty());
        assert_eq!(loaded.declared_count, Some(0));

        // The first line is never a point, even if it looks like one.
        let loaded: LoadedPoints<Point2D> =
            parse_points("1.0 2.0\n3.0 4.0\n".as_bytes(), MalformedRowPolicy::Fail).unwrap();
        assert_eq!(loaded.points, vec![Point2D::new(3.0, 4.0)]);
        assert_eq!(loaded.declared_count, None);

        let loaded: LoadedPoints<Point2D> =
            parse_points("".as_bytes(), MalformedRowPolicy::Fail).unwrap();
        assert!(loaded.points.is_empty());
    }

    #[test]
    fn test_load_correspondences_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path_3d = dir.path().join("3D.txt");
        let path_2d = dir.path().join("2D.txt");

        let mut buf_3d = String::from("6\n");
        let mut buf_2d = String::from("6\n");
        for i in 0..6 {
            buf_3d.push_str(&format!("{i}.0 {}.0 1.0\n", i * 2));
            buf_2d.push_str(&format!("{i}.0 {}.0\n", i * 2));
        }
        buf_2d.push_str("oops\n");
        std::fs::write(&path_3d, buf_3d).unwrap();
        std::fs::write(&path_2d, buf_2d).unwrap();

        let loaded = load_correspondences(&path_3d, &path_2d, MalformedRowPolicy::Skip).unwrap();
        assert_eq!(loaded.correspondences.len(), 6);
        assert!(loaded.malformed_3d.is_empty());
        assert_eq!(loaded.malformed_2d.len(), 1);
        assert_eq!(loaded.malformed_2d[0].line, 8);

        let err = load_correspondences(&path_3d, &path_2d, MalformedRowPolicy::Fail).unwrap_err();
        assert!(matches!(err, DltCalError::MalformedRow(_)));
    }

    #[test]
    fn test_load_correspondences_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path_3d = dir.path().join("3D.txt");
        let path_2d = dir.path().join("2D.txt");
        std::fs::write(&path_3d, "2\n1 2 3\n4 5 6\n").unwrap();
        std::fs::write(&path_2d, "1\n1 2\n").unwrap();
        let err = load_correspondences(&path_3d, &path_2d, MalformedRowPolicy::Skip).unwrap_err();
        assert!(matches!(
            err,
            DltCalError::ShapeMismatch(ShapeMismatch::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_points_3d(dir.path().join("nope.txt"), MalformedRowPolicy::Skip)
            .unwrap_err();
        assert!(matches!(err, DltCalError::Io { .. }));
    }
}
