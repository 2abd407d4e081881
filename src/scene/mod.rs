mod bounds;

pub use bounds::Bounds;

use crate::assets::{parse_geometry_file, AssetError, MeshGeometry, ParseMode};
use std::path::{Path, PathBuf};

/// Creates the GPU-side copy of a mesh. Dropping the handle releases it.
pub trait MeshUploader {
    type Handle;

    fn upload(&mut self, label: &str, geometry: &MeshGeometry) -> Self::Handle;
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no geometry files were given")]
    NoFiles,
    #[error("none of the selected geometry files could be read: {0}")]
    Unreadable(#[source] AssetError),
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: AssetError,
    },
}

/// One loaded file. Empty files (or unreadable siblings) stay as placeholders
/// with no bounds and no GPU handle.
#[derive(Debug)]
pub struct Mesh<H> {
    pub name: String,
    pub path: PathBuf,
    pub geometry: MeshGeometry,
    pub bounds: Option<Bounds>,
    gpu: Option<H>,
}

impl<H> Mesh<H> {
    fn placeholder(path: &Path) -> Self {
        Self {
            name: display_name(path),
            path: path.to_path_buf(),
            geometry: MeshGeometry::default(),
            bounds: None,
            gpu: None,
        }
    }

    pub fn gpu(&self) -> Option<&H> {
        self.gpu.as_ref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.gpu.is_none()
    }
}

#[derive(Debug)]
pub struct Scene<H> {
    meshes: Vec<Mesh<H>>,
    bounds: Option<Bounds>,
}

impl<H> Scene<H> {
    pub fn load<U>(paths: &[PathBuf], mode: ParseMode, uploader: &mut U) -> Result<Self, SceneError>
    where
        U: MeshUploader<Handle = H>,
    {
        if paths.is_empty() {
            return Err(SceneError::NoFiles);
        }

        let mut meshes = Vec::with_capacity(paths.len());
        let mut first_read_error = None;
        let mut readable = 0usize;

        for path in paths {
            let geometry = match parse_geometry_file(path, mode) {
                Ok((geometry, stats)) => {
                    readable += 1;
                    if stats.skipped_lines > 0 {
                        log::debug!(
                            "{}: ignored {} unsupported lines",
                            path.display(),
                            stats.skipped_lines
                        );
                    }
                    geometry
                }
                Err(err @ AssetError::Read { .. }) => {
                    log::warn!("Skipping unreadable geometry: {}", err);
                    if first_read_error.is_none() {
                        first_read_error = Some(err);
                    }
                    meshes.push(Mesh::placeholder(path));
                    continue;
                }
                Err(source) => {
                    return Err(SceneError::Parse {
                        path: path.display().to_string(),
                        source,
                    })
                }
            };

            if geometry.is_empty() {
                log::warn!("Warning: No mesh data loaded from {}", path.display());
                meshes.push(Mesh::placeholder(path));
                continue;
            }

            let name = display_name(path);
            let bounds = Bounds::from_vertices(&geometry.vertices);
            let gpu = uploader.upload(&name, &geometry);
            meshes.push(Mesh {
                name,
                path: path.clone(),
                geometry,
                bounds,
                gpu: Some(gpu),
            });
        }

        if readable == 0 {
            if let Some(err) = first_read_error {
                return Err(SceneError::Unreadable(err));
            }
        }

        let bounds = meshes
            .iter()
            .filter_map(|mesh| mesh.bounds)
            .reduce(Bounds::union);
        if let Some(bounds) = bounds {
            log::info!(
                "Scene bounds: min {:?} max {:?} ({} meshes)",
                bounds.min.to_array(),
                bounds.max.to_array(),
                meshes.len()
            );
        } else {
            log::warn!("Scene has no drawable geometry");
        }

        Ok(Self { meshes, bounds })
    }

    /// Releases every GPU handle before the scene is dropped.
    pub fn unload(mut self) {
        let mut released = 0usize;
        for mesh in &mut self.meshes {
            if mesh.gpu.take().is_some() {
                log::debug!("Released GPU buffers for {}", mesh.path.display());
                released += 1;
            }
        }
        self.meshes.clear();
        log::info!("Unloaded scene ({} GPU meshes released)", released);
    }

    pub fn meshes(&self) -> &[Mesh<H>] {
        &self.meshes
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn names(&self) -> Vec<&str> {
        self.meshes.iter().map(|mesh| mesh.name.as_str()).collect()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("mesh")
        .to_string()
}
