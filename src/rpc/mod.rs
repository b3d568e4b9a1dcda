//! Remote-procedure router.
//!
//! Procedures are grouped under a closed set of namespaces. Each namespace owns
//! a static table of `{name, kind, handler}` entries, so the full surface is
//! known at build time and an [`AppRouter`] can never gain or lose procedures
//! after startup. The same declarations generate the typed in-process
//! [`Caller`], which calls the actions directly and returns their typed output.

use serde::Serialize;
use serde_json::Value;
use std::{fmt, future::Future, pin::Pin};
use tracing::error;

use crate::{
    actions::{
        ActionContext, ActionError, Backends, admin, calls, campaigns, organization, patients,
        runs,
    },
    auth::{Access, Session},
    models::{
        Call, Campaign, DashboardStats, Invitation, Member, Organization, Patient, Run,
    },
};
use uuid::Uuid;


pub type ProcedureFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Value, ActionError>> + Send + 'a>>;

type Handler = for<'a> fn(&'a ActionContext, Value) -> ProcedureFuture<'a>;

/// Queries read, mutations write. Transports map them to `GET` and `POST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Mutation => f.write_str("mutation"),
        }
    }
}

pub struct Procedure {
    pub name: &'static str,
    pub kind: ProcedureKind,
    /// Checked before the input is decoded; the action checks it again.
    pub access: Access,
    handler: Handler,
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

fn encode<T: Serialize>(result: Result<T, ActionError>) -> Result<Value, ActionError> {
    serde_json::to_value(result?).map_err(|err| {
        error!("Failed to encode procedure output: {err}");
        ActionError::Service("Failed to encode response".to_string())
    })
}

/// Declares a namespace once: its static procedure table and its typed caller.
macro_rules! namespace {
    (
        $table:ident, $caller:ident,
        [$( $name:literal => $method:ident ($kind:ident, $access:ident, $action:path) -> $output:ty ),+ $(,)?]
    ) => {
        static $table: &[Procedure] = &[$(
            Procedure {
                name: $name,
                kind: ProcedureKind::$kind,
                access: Access::$access,
                handler: |ctx, input| Box::pin(async move { encode($action(ctx, input).await) }),
            },
        )+];

        #[derive(Clone, Copy)]
        pub struct $caller<'a> {
            ctx: &'a ActionContext,
        }

        impl $caller<'_> {
            $(
                /// # Errors
                /// Whatever the underlying action returns.
                pub async fn $method(&self, input: Value) -> Result<$output, ActionError> {
                    $action(self.ctx, input).await
                }
            )+
        }
    };
}

namespace!(ORGANIZATION, OrganizationCaller, [
    "get" => get(Query, Org, organization::get_organization) -> Organization,
    "listMembers" => list_members(Query, Org, organization::list_members) -> Vec<Member>,
    "inviteMember" => invite_member(Mutation, OrgAdmin, organization::invite_member) -> Invitation,
]);

namespace!(CAMPAIGN, CampaignCaller, [
    "create" => create(Mutation, Org, campaigns::create_campaign) -> Campaign,
    "list" => list(Query, Org, campaigns::list_campaigns) -> Vec<Campaign>,
    "get" => get(Query, Org, campaigns::get_campaign) -> Campaign,
    "updateStatus" => update_status(Mutation, Org, campaigns::update_campaign_status) -> Campaign,
]);

namespace!(RUN, RunCaller, [
    "create" => create(Mutation, Org, runs::create_run) -> Run,
    "list" => list(Query, Org, runs::list_runs) -> Vec<Run>,
    "get" => get(Query, Org, runs::get_run) -> Run,
    "cancel" => cancel(Mutation, Org, runs::cancel_run) -> Run,
]);

namespace!(PATIENT, PatientCaller, [
    "create" => create(Mutation, Org, patients::create_patient) -> Patient,
    "update" => update(Mutation, Org, patients::update_patient) -> Patient,
    "delete" => delete(Mutation, Org, patients::delete_patient) -> Uuid,
    "list" => list(Query, Org, patients::list_patients) -> Vec<Patient>,
    "get" => get(Query, Org, patients::get_patient) -> Patient,
]);

namespace!(CALL, CallCaller, [
    "list" => list(Query, Org, calls::list_calls) -> Vec<Call>,
    "get" => get(Query, Org, calls::get_call) -> Call,
]);

namespace!(ADMIN, AdminCaller, [
    "getRecentCalls" => get_recent_calls(Query, SuperAdmin, admin::get_recent_calls) -> Vec<Call>,
    "listOrganizations" => list_organizations(Query, SuperAdmin, admin::list_organizations) -> Vec<Organization>,
]);

namespace!(DASHBOARD, DashboardCaller, [
    "getDashboardStats" => get_dashboard_stats(Query, SuperAdmin, admin::get_dashboard_stats) -> DashboardStats,
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Organization,
    Campaign,
    Run,
    Patient,
    Call,
    Admin,
    Dashboard,
}

impl Namespace {
    pub const ALL: [Self; 7] = [
        Self::Organization,
        Self::Campaign,
        Self::Run,
        Self::Patient,
        Self::Call,
        Self::Admin,
        Self::Dashboard,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Campaign => "campaign",
            Self::Run => "run",
            Self::Patient => "patient",
            Self::Call => "call",
            Self::Admin => "admin",
            Self::Dashboard => "dashboard",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.as_str() == value)
    }

    #[must_use]
    pub fn procedures(self) -> &'static [Procedure] {
        match self {
            Self::Organization => ORGANIZATION,
            Self::Campaign => CAMPAIGN,
            Self::Run => RUN,
            Self::Patient => PATIENT,
            Self::Call => CALL,
            Self::Admin => ADMIN,
            Self::Dashboard => DASHBOARD,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("No procedure named {0}")]
    NotFound(String),
    #[error("{path} is a {kind}")]
    MethodNotAllowed { path: String, kind: ProcedureKind },
    /// The transport could not look up the caller's session.
    #[error("Session lookup failed")]
    Session,
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Resolve `namespace.method` against the static tables.
#[must_use]
pub fn resolve(path: &str) -> Option<&'static Procedure> {
    let (namespace, method) = path.split_once('.')?;
    Namespace::parse(namespace)?
        .procedures()
        .iter()
        .find(|procedure| procedure.name == method)
}

/// Every procedure as `(namespace.method, kind)`, in table order.
pub fn procedures() -> impl Iterator<Item = (String, ProcedureKind)> {
    Namespace::ALL.into_iter().flat_map(|namespace| {
        namespace
            .procedures()
            .iter()
            .map(move |procedure| (format!("{}.{}", namespace.as_str(), procedure.name), procedure.kind))
    })
}

/// Root router: the namespace map bound to the process-wide backends.
#[derive(Clone)]
pub struct AppRouter {
    backends: Backends,
}

impl AppRouter {
    #[must_use]
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    /// Find the procedure at `path` and check the transport verb.
    ///
    /// # Errors
    /// `NotFound` for unknown paths, `MethodNotAllowed` when `kind` differs
    /// from the procedure's kind.
    pub fn route(path: &str, kind: ProcedureKind) -> Result<&'static Procedure, RpcError> {
        let procedure = resolve(path).ok_or_else(|| RpcError::NotFound(path.to_string()))?;
        if procedure.kind != kind {
            return Err(RpcError::MethodNotAllowed {
                path: path.to_string(),
                kind: procedure.kind,
            });
        }
        Ok(procedure)
    }

    /// Run a routed procedure as `session`.
    ///
    /// # Errors
    /// Whatever the action returns.
    pub async fn invoke(
        &self,
        procedure: &'static Procedure,
        session: Option<Session>,
        input: Value,
    ) -> Result<Value, RpcError> {
        procedure.access.check(session.as_ref()).map_err(ActionError::from)?;
        let ctx = ActionContext::new(session, self.backends.clone());
        Ok((procedure.handler)(&ctx, input).await?)
    }

    /// Route and run a procedure, returning its JSON output.
    ///
    /// # Errors
    /// See [`AppRouter::route`] and [`AppRouter::invoke`].
    pub async fn dispatch(
        &self,
        session: Option<Session>,
        path: &str,
        kind: ProcedureKind,
        input: Value,
    ) -> Result<Value, RpcError> {
        let procedure = Self::route(path, kind)?;
        self.invoke(procedure, session, input).await
    }

    /// Typed in-process caller acting as `session`.
    #[must_use]
    pub fn caller(&self, session: Option<Session>) -> Caller {
        Caller {
            ctx: ActionContext::new(session, self.backends.clone()),
        }
    }
}

/// In-process client mirroring the namespace map.
#[derive(Clone)]
pub struct Caller {
    ctx: ActionContext,
}

impl Caller {
    #[must_use]
    pub fn organization(&self) -> OrganizationCaller<'_> {
        OrganizationCaller { ctx: &self.ctx }
    }

    #[must_use]
    pub fn campaign(&self) -> CampaignCaller<'_> {
        CampaignCaller { ctx: &self.ctx }
    }

    #[must_use]
    pub fn run(&self) -> RunCaller<'_> {
        RunCaller { ctx: &self.ctx }
    }

    #[must_use]
    pub fn patient(&self) -> PatientCaller<'_> {
        PatientCaller { ctx: &self.ctx }
    }

    #[must_use]
    pub fn call(&self) -> CallCaller<'_> {
        CallCaller { ctx: &self.ctx }
    }

    #[must_use]
    pub fn admin(&self) -> AdminCaller<'_> {
        AdminCaller { ctx: &self.ctx }
    }

    #[must_use]
    pub fn dashboard(&self) -> DashboardCaller<'_> {
        DashboardCaller { ctx: &self.ctx }
    }
}
