use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Files(Vec<PathBuf>),
    Cancelled,
}

impl Selection {
    /// An empty list is treated like a cancellation.
    pub fn from_paths(paths: Option<Vec<PathBuf>>) -> Self {
        match paths {
            Some(paths) if !paths.is_empty() => Self::Files(paths),
            _ => Self::Cancelled,
        }
    }
}

pub trait FileSelector {
    fn select_files(&mut self) -> Selection;
}

/// Native multi-file picker filtered to `.obj`. Remembers the directory of the
/// last selection for the lifetime of the process.
#[derive(Debug, Default)]
pub struct RfdSelector {
    last_directory: Option<PathBuf>,
}

impl RfdSelector {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember(&mut self, selection: &Selection) {
        if let Selection::Files(paths) = selection {
            if let Some(parent) = paths.first().and_then(|path| path.parent()) {
                self.last_directory = Some(parent.to_path_buf());
            }
        }
    }
}

impl FileSelector for RfdSelector {
    fn select_files(&mut self) -> Selection {
        let mut dialog = rfd::FileDialog::new()
            .set_title("Select OBJ Files")
            .add_filter("OBJ files", &["obj"]);
        if let Some(dir) = &self.last_directory {
            dialog = dialog.set_directory(dir);
        }
        let selection = Selection::from_paths(dialog.pick_files());
        self.remember(&selection);
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn empty_pick_is_cancelled() {
        assert_eq!(Selection::from_paths(None), Selection::Cancelled);
        assert_eq!(Selection::from_paths(Some(Vec::new())), Selection::Cancelled);
    }

    #[test]
    fn directory_of_first_file_is_remembered() {
        let mut selector = RfdSelector::new();
        selector.remember(&Selection::Files(vec![
            PathBuf::from("/data/meshes/a.obj"),
            PathBuf::from("/other/b.obj"),
        ]));
        assert_eq!(selector.last_directory.as_deref(), Some(Path::new("/data/meshes")));

        selector.remember(&Selection::Cancelled);
        assert_eq!(selector.last_directory.as_deref(), Some(Path::new("/data/meshes")));
    }
}
