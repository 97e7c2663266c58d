//! Host command layer.
//!
//! Providers expose named actions; the [`Dispatcher`] routes an
//! `(provider, action, args)` request to the right one. Output goes to the
//! shared [`Response`] held by the [`Registry`], never straight to stdout.

pub mod schema;

pub use schema::{DatabaseSchemaProvider, ERROR_HEADER};

use crate::config::UserSettings;
use crate::error::{DispatchError, SchemaError};
use crate::project::ProjectProfile;

/// Collected output lines of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_content(&mut self, content: impl Into<String>) {
        self.lines.push(content.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Report a failure as [`ERROR_HEADER`] followed by the error text.
    pub fn append_error(&mut self, err: &SchemaError) {
        self.append_content(ERROR_HEADER);
        self.append_content(err.to_string());
    }

    /// Take the collected lines, leaving the response empty.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

/// Host state shared with providers for one invocation.
#[derive(Debug, Default)]
pub struct Registry {
    project: Option<ProjectProfile>,
    user_settings: UserSettings,
    response: Response,
}

impl Registry {
    pub fn new(project: Option<ProjectProfile>, user_settings: UserSettings) -> Self {
        Self {
            project,
            user_settings,
            response: Response::new(),
        }
    }

    /// The current project, if one was loaded.
    pub fn project(&self) -> Option<&ProjectProfile> {
        self.project.as_ref()
    }

    pub fn user_settings(&self) -> &UserSettings {
        &self.user_settings
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }
}

/// Signature of a provider action: its name and positional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    /// Parameter names, in position order.
    pub params: &'static [&'static str],
    /// How many leading parameters are mandatory.
    pub required: usize,
}

impl ActionSpec {
    /// Check an argument list against this signature.
    pub fn check_args(&self, args: &[String]) -> Result<(), DispatchError> {
        if args.len() < self.required {
            return Err(DispatchError::MissingArgument {
                action: self.name.to_string(),
                argument: self.params[args.len()].to_string(),
            });
        }
        if args.len() > self.params.len() {
            return Err(DispatchError::TooManyArguments {
                action: self.name.to_string(),
                max: self.params.len(),
                given: args.len(),
            });
        }
        Ok(())
    }
}

/// A command provider the host can invoke by name.
pub trait Provider {
    /// Name used to address this provider.
    fn name(&self) -> &'static str;

    /// Actions this provider accepts.
    fn actions(&self) -> &'static [ActionSpec];

    /// Run `action` with positional `args`.
    ///
    /// `Ok(false)` means the action ran and reported a failure in the
    /// response; `Err` means it could not be invoked at all.
    fn invoke(
        &self,
        action: &str,
        args: &[String],
        registry: &mut Registry,
    ) -> Result<bool, DispatchError>;

    fn action(&self, name: &str) -> Option<&'static ActionSpec> {
        self.actions().iter().find(|spec| spec.name == name)
    }
}

/// Routes invocations to registered providers.
#[derive(Default)]
pub struct Dispatcher {
    providers: Vec<Box<dyn Provider>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with every built-in provider registered.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(DatabaseSchemaProvider::new()));
        dispatcher
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Validate and run `provider.action(args)`.
    pub fn dispatch(
        &self,
        provider: &str,
        action: &str,
        args: &[String],
        registry: &mut Registry,
    ) -> Result<bool, DispatchError> {
        let target = self
            .providers
            .iter()
            .find(|p| p.name() == provider)
            .ok_or_else(|| DispatchError::UnknownProvider(provider.to_string()))?;

        let spec = target
            .action(action)
            .ok_or_else(|| DispatchError::UnknownAction {
                provider: provider.to_string(),
                action: action.to_string(),
            })?;
        spec.check_args(args)?;

        tracing::debug!(provider, action, ?args, "Dispatching provider action");
        target.invoke(action, args, registry)
    }
}
