//! Test fixtures for release integration tests.

use meridian_release::apps::App;
use meridian_release::types::ReleaseId;

/// Builder for creating test App records.
pub struct AppBuilder {
    app: App,
}

impl AppBuilder {
    /// Creates a new app builder.
    pub fn new(cluster: &str, name: &str) -> Self {
        Self {
            app: App::new(cluster, name),
        }
    }

    /// Sets a stack output.
    pub fn with_output(mut self, key: &str, value: &str) -> Self {
        self.app.outputs.insert(key.to_string(), value.to_string());
        self
    }

    /// Sets a stack parameter.
    pub fn with_parameter(mut self, key: &str, value: &str) -> Self {
        self.app.parameters.insert(key.to_string(), value.to_string());
        self
    }

    /// Sets the active release.
    pub fn with_release(mut self, id: &ReleaseId) -> Self {
        self.app.release = Some(id.clone());
        self
    }

    /// Builds the App.
    pub fn build(self) -> App {
        self.app
    }
}

/// Builder for TOML manifests.
#[derive(Default)]
pub struct ManifestBuilder {
    processes: Vec<String>,
}

impl ManifestBuilder {
    /// Creates an empty manifest builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a process with the given ports.
    pub fn with_process(mut self, name: &str, ports: &[u16]) -> Self {
        let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
        self.processes.push(format!(
            "[[process]]\nname = \"{name}\"\nports = [{}]\n",
            ports.join(", ")
        ));
        self
    }

    /// Adds a process with a command override and replica count.
    pub fn with_command(mut self, name: &str, command: &str, count: u32) -> Self {
        self.processes.push(format!(
            "[[process]]\nname = \"{name}\"\ncommand = \"{command}\"\ncount = {count}\n"
        ));
        self
    }

    /// Renders the manifest.
    pub fn build(self) -> String {
        self.processes.join("\n")
    }
}
