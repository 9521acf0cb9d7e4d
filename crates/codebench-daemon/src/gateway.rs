//! Request dispatch onto the workspace components

use codebench_core::protocol::{Request, Response};
use codebench_core::{
    PackageInstaller, ProcessRunner, Result, WorkspaceConfig, WorkspaceRoot, WorkspaceStore,
};
use std::sync::Arc;

/// Store, runner and installer sharing one workspace root
#[derive(Debug, Clone)]
pub struct Gateway {
    store: WorkspaceStore,
    runner: ProcessRunner,
    installer: PackageInstaller,
}

impl Gateway {
    pub fn new(config: WorkspaceConfig) -> Result<Self> {
        let root = Arc::new(WorkspaceRoot::new(&config.root)?);
        let config = Arc::new(config);

        Ok(Self {
            store: WorkspaceStore::new(Arc::clone(&root)),
            runner: ProcessRunner::new(Arc::clone(&root), Arc::clone(&config)),
            installer: PackageInstaller::new(root, config),
        })
    }

    pub fn root(&self) -> &WorkspaceRoot {
        self.store.root()
    }

    /// Handle a single request; failures become `Response::Error`
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(kind = e.kind(), error = %e, "request failed");
                Response::from(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        Ok(match request {
            Request::Tree => Response::Tree {
                nodes: self.store.tree().await?,
            },
            Request::ReadFile { path } => Response::File {
                content: self.store.read_file(&path).await?,
            },
            Request::WriteFile { path, content } => {
                self.store.write_file(&path, &content).await?;
                Response::Ok
            }
            Request::DeleteFile { path } => {
                self.store.delete(&path).await?;
                Response::Ok
            }
            Request::MakeDirectory { path } => {
                self.store.make_directory(&path).await?;
                Response::Ok
            }
            Request::Upload { files } => Response::Uploaded {
                files: self.store.store_uploads(&files).await?,
            },
            Request::Install(req) => Response::Execution(self.installer.install(&req).await?),
            Request::Execute(req) => Response::Execution(self.runner.execute(&req).await?),
            Request::Ping => Response::Pong,
        })
    }
}
