//! Execution driver
//!
//! Owns the VM handle for one test, runs the top-level command list as a
//! [`Sequence`] and turns the outcome into pass/fail. Teardown of the VM is
//! centralized here in [`Runner::shutdown`].

use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::command::{BoxCommand, Command, Screenshot, Sequence};
use crate::context::{Context, Environment};
use vmtest_common::{Error, Provisioner, Result, Vm, VmInfo};

/// Name of the log file kept in the output directory
pub const LOG_FILE: &str = "vmtest.log";

/// Runs one test against one VM
pub struct Runner {
    info: VmInfo,
    provisioner: Box<dyn Provisioner>,
    vm: Option<Box<dyn Vm>>,
    env: Environment,
    output_dir: PathBuf,
}

impl Runner {
    pub fn new(
        info: VmInfo,
        provisioner: Box<dyn Provisioner>,
        env: Environment,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            info,
            provisioner,
            vm: None,
            env,
            output_dir: output_dir.into(),
        }
    }

    /// Whether a VM handle is currently held
    pub fn has_vm(&self) -> bool {
        self.vm.is_some()
    }

    async fn ensure_vm(&mut self) -> Result<()> {
        if self.vm.is_none() {
            info!("Provisioning VM {}", self.info);
            let vm = self.provisioner.provision(&self.info).await?;
            self.vm = Some(vm);
        }
        Ok(())
    }

    fn context(&self) -> Result<Context<'_>> {
        let vm = self
            .vm
            .as_deref()
            .ok_or_else(|| Error::Provision(format!("No VM for {}", self.info)))?;
        Ok(Context::new(vm, &self.env))
    }

    async fn execute(&mut self, sequence: &Sequence) -> Result<()> {
        self.ensure_vm().await?;
        let ctx = self.context()?;
        sequence.execute(&ctx).await
    }

    /// Run the commands, treating Ctrl-C as an interrupt
    pub async fn run(&mut self, commands: Vec<BoxCommand>) -> Result<bool> {
        self.run_until(commands, async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the commands until they finish or `interrupt` completes.
    ///
    /// Returns `Ok(false)` on a failure or an interrupt, `Err` on a fatal
    /// error. The VM is kept either way; call [`Runner::shutdown`].
    pub async fn run_until<F>(&mut self, commands: Vec<BoxCommand>, interrupt: F) -> Result<bool>
    where
        F: Future<Output = ()>,
    {
        let sequence = Sequence::new(commands);

        let outcome = tokio::select! {
            outcome = self.execute(&sequence) => outcome,
            _ = interrupt => {
                warn!("Exiting on request");
                return Ok(false);
            }
        };

        match outcome {
            Ok(()) => Ok(true),
            Err(Error::Failed(failure)) => {
                error!("Test failed: {}", failure);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Capture a fresh screenshot and move it to `dest`
    pub async fn store_screenshot(&mut self, dest: &Path) -> Result<()> {
        self.ensure_vm().await?;
        let ctx = self.context()?;
        let png = Screenshot::default().capture(&ctx).await?;
        move_file(&png, dest)
    }

    /// Copy the run's log file to `dest`
    pub fn store_log(&self, dest: &Path) -> Result<()> {
        std::fs::copy(self.output_dir.join(LOG_FILE), dest)?;
        Ok(())
    }

    /// Delete the output directory with all intermediate results
    pub fn remove_results(&self) -> Result<()> {
        if self.output_dir.exists() {
            std::fs::remove_dir_all(&self.output_dir)?;
        }
        Ok(())
    }

    /// Power the VM off and delete its backing files
    pub async fn remove_vm(&mut self, keep_iso: bool) -> Result<()> {
        if let Some(vm) = &self.vm {
            vm.power_off().await?;
            vm.remove(keep_iso).await?;
        }
        Ok(())
    }

    /// Release the VM: power down, close the control socket and stop the
    /// VM process. Consumes the runner, so this happens at most once.
    pub async fn shutdown(mut self) -> Result<()> {
        match self.vm.take() {
            Some(vm) => {
                info!("Shutting down VM {}", self.info);
                vm.shutdown().await
            }
            None => Ok(()),
        }
    }
}

fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if std::fs::rename(src, dest).is_err() {
        std::fs::copy(src, dest)?;
        std::fs::remove_file(src)?;
    }
    Ok(())
}
