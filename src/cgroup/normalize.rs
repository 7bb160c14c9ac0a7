use crate::container::ContainerID;

use super::{Error, Result};

/// Controller whose hierarchy is used to identify the container on cgroup v1.
const PIDS_CONTROLLER: &str = "pids";

/// A single `<hierarchy-id>:<controller-list>:<cgroup-path>` line.
struct CgroupLine<'a> {
    controller_list: &'a str,
    cgroup_path: &'a str,
}

impl<'a> CgroupLine<'a> {
    /// Splits a line without validating the hierarchy id. The path is everything after
    /// the last `:`; a line without any `:` is taken as a bare path.
    fn split(line: &'a str) -> Self {
        match line.rsplit_once(':') {
            Some((head, cgroup_path)) => Self {
                controller_list: head.split_once(':').map_or("", |(_, list)| list),
                cgroup_path,
            },
            None => Self {
                controller_list: "",
                cgroup_path: line,
            },
        }
    }

    fn has_controller(&self, controller: &str) -> bool {
        self.controller_list.split(',').any(|c| c == controller)
    }
}

/// Decodes the content of a `/proc/<pid>/cgroup` file into a [`ContainerID`].
///
/// Runs, in order: line selection, dash stripping on the full path, basename
/// extraction, dash stripping on the basename and suffix stripping.
///
/// The dash rules keep everything after the *last* `-`, which is what makes the
/// systemd driver scopes (`docker-<id>.scope`) work, but it would truncate an id
/// that itself contains a `-`.
///
/// # Errors
///
/// - [`Error::CgroupNotFound`] if there is no unified line and no `pids` hierarchy.
/// - [`Error::CgroupPathNotFound`] if the pipeline leaves nothing of the path.
///
/// # Examples
///
/// ```
/// # use tracer_discovery::cgroup::normalize;
/// let id = normalize("0::/system.slice/docker-4f3e2d1c.scope\n").unwrap();
/// assert_eq!(id.as_str(), "4f3e2d1c");
/// ```
pub fn normalize(content: &str) -> Result<ContainerID> {
    let cgroup_path = select_cgroup_path(content)?;
    let id = strip_extension(strip_through_last_dash(basename(strip_through_last_dash(
        cgroup_path,
    ))));

    if id.is_empty() {
        return Err(Error::CgroupPathNotFound {
            cgroup_path: cgroup_path.to_owned(),
        });
    }

    Ok(ContainerID::new(id)?)
}

/// Picks the cgroup path identifying the container.
///
/// A single line is the cgroup v2 unified hierarchy. With several lines the `pids`
/// hierarchy is used. A trailing newline and blank lines do not count as lines.
fn select_cgroup_path(content: &str) -> Result<&str> {
    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    match lines.as_slice() {
        [line] => Ok(CgroupLine::split(line).cgroup_path),
        lines => lines
            .iter()
            .map(|line| CgroupLine::split(line))
            .find(|line| line.has_controller(PIDS_CONTROLLER))
            .map(|line| line.cgroup_path)
            .ok_or(Error::CgroupNotFound),
    }
}

/// Keeps everything after the last `-`, or the input if it has none.
fn strip_through_last_dash(s: &str) -> &str {
    s.rsplit_once('-').map_or(s, |(_, rest)| rest)
}

/// Returns the final `/`-separated segment, ignoring trailing slashes.
fn basename(path: &str) -> &str {
    path.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Strips a dotted suffix such as `.scope`.
fn strip_extension(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}
