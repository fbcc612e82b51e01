//! Per-test lifecycle around an application.
//!
//! A [`TestFixture`] owns the application and a [`TestClient`] for it.
//! Dropping the fixture runs [`Application::cleanup`] and then undoes every
//! override registered through [`TestFixture::override_value`], newest first.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut fx = TestFixture::new(MyApp::default())?;
//! fx.override_value(&settings::DEBUG, true);
//!
//! let resp = fx.client().get("/").send().into_response()?;
//!
//! // Async test body: the client is deferred while it runs.
//! let resp = fx.run(|client| async move { client.get("/").send().await })?;
//! ```

use std::future::Future;

use crate::client::TestClient;
use crate::config::{HarnessConfig, Mode};
use crate::driver::Application;
use crate::error::Result;
use crate::overrides::{Override, Setting};

/// Owns an application, its client and the overrides made for one test.
pub struct TestFixture<A: Application> {
    client: TestClient<A>,
    overrides: Vec<Box<dyn Send>>,
    torn_down: bool,
}

impl<A: Application> TestFixture<A> {
    pub fn new(app: A) -> Result<Self> {
        Self::with_config(app, HarnessConfig::default())
    }

    pub fn with_config(app: A, config: HarnessConfig) -> Result<Self> {
        Ok(Self {
            client: TestClient::with_config(app, config)?,
            overrides: Vec::new(),
            torn_down: false,
        })
    }

    pub fn client(&self) -> &TestClient<A> {
        &self.client
    }

    pub fn app(&self) -> &A {
        self.client.app()
    }

    /// Run an async test body with the client in deferred mode.
    ///
    /// The previous mode is restored afterwards, even if `body` panics.
    pub fn run<'a, F, Fut>(&'a self, body: F) -> Fut::Output
    where
        F: FnOnce(&'a TestClient<A>) -> Fut,
        Fut: Future + 'a,
    {
        let _mode = ModeRestore::switch(&self.client, Mode::Deferred);
        self.client.block_on(body(&self.client))
    }

    /// Drive `fut` to completion with the client in deferred mode.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        let _mode = ModeRestore::switch(&self.client, Mode::Deferred);
        self.client.block_on(fut)
    }

    /// Override `setting` until the fixture is torn down.
    pub fn override_value<T>(&mut self, setting: &'static Setting<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.overrides.push(Box::new(Override::new(setting, value)));
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Run teardown now instead of on drop.
    pub fn teardown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if tokio::runtime::Handle::try_current().is_ok() {
            tracing::warn!("fixture dropped inside an async runtime, application cleanup skipped");
        } else {
            self.client.block_on(self.client.app().cleanup());
            tracing::debug!("application cleanup finished");
        }

        while let Some(guard) = self.overrides.pop() {
            drop(guard);
        }
    }
}

impl<A: Application> Drop for TestFixture<A> {
    fn drop(&mut self) {
        self.finish();
    }
}

struct ModeRestore<'a, A: Application> {
    client: &'a TestClient<A>,
    previous: Mode,
}

impl<'a, A: Application> ModeRestore<'a, A> {
    fn switch(client: &'a TestClient<A>, mode: Mode) -> Self {
        let previous = client.mode();
        client.set_mode(mode);
        Self { client, previous }
    }
}

impl<A: Application> Drop for ModeRestore<'_, A> {
    fn drop(&mut self) {
        self.client.set_mode(self.previous);
    }
}
