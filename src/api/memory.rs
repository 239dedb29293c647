// ABOUTME: In-process control plane implementing EcsApi and EventsApi.
// ABOUTME: Scriptable convergence, exit codes, and failures; records every request.

use super::ecs::{
    DescribeServicesRequest, DescribeServicesResponse, DescribeTaskDefinitionRequest,
    DescribeTasksRequest, DescribeTasksResponse, EcsApi, ListTasksRequest, ListTasksResponse,
    RegisterTaskDefinitionRequest, RunTaskRequest, RunTaskResponse, TaskDefinitionResponse,
    UpdateServiceRequest, UpdateServiceResponse,
};
use super::error::ApiError;
use super::events::{
    DescribeRuleRequest, EventsApi, FailedEntry, ListTargetsByRuleRequest,
    ListTargetsByRuleResponse, PutTargetsRequest, PutTargetsResponse, Rule, Target,
};
use super::models::{
    Container, DEPLOYMENT_PRIMARY, Deployment, Failure, Service, TASK_PENDING, TASK_RUNNING,
    TASK_STOPPED, Task, TaskDefinition,
};
use crate::types::{TaskArn, TaskDefinitionArn};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

const ACCOUNT_PREFIX: &str = "arn:aws:ecs:us-east-1:000000000000";

/// Control-plane operations, used for failure injection and request counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeServices,
    UpdateService,
    ListTasks,
    DescribeTasks,
    RunTask,
    DescribeTaskDefinition,
    RegisterTaskDefinition,
    DescribeRule,
    ListTargetsByRule,
    PutTargets,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DescribeServices => "DescribeServices",
            Operation::UpdateService => "UpdateService",
            Operation::ListTasks => "ListTasks",
            Operation::DescribeTasks => "DescribeTasks",
            Operation::RunTask => "RunTask",
            Operation::DescribeTaskDefinition => "DescribeTaskDefinition",
            Operation::RegisterTaskDefinition => "RegisterTaskDefinition",
            Operation::DescribeRule => "DescribeRule",
            Operation::ListTargetsByRule => "ListTargetsByRule",
            Operation::PutTargets => "PutTargets",
        }
    }
}

/// A request as received, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    DescribeServices(DescribeServicesRequest),
    UpdateService(UpdateServiceRequest),
    ListTasks(ListTasksRequest),
    DescribeTasks(DescribeTasksRequest),
    RunTask(RunTaskRequest),
    DescribeTaskDefinition(DescribeTaskDefinitionRequest),
    RegisterTaskDefinition(RegisterTaskDefinitionRequest),
    DescribeRule(DescribeRuleRequest),
    ListTargetsByRule(ListTargetsByRuleRequest),
    PutTargets(PutTargetsRequest),
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::DescribeServices(_) => Operation::DescribeServices,
            Request::UpdateService(_) => Operation::UpdateService,
            Request::ListTasks(_) => Operation::ListTasks,
            Request::DescribeTasks(_) => Operation::DescribeTasks,
            Request::RunTask(_) => Operation::RunTask,
            Request::DescribeTaskDefinition(_) => Operation::DescribeTaskDefinition,
            Request::RegisterTaskDefinition(_) => Operation::RegisterTaskDefinition,
            Request::DescribeRule(_) => Operation::DescribeRule,
            Request::ListTargetsByRule(_) => Operation::ListTargetsByRule,
            Request::PutTargets(_) => Operation::PutTargets,
        }
    }
}

#[derive(Debug)]
struct ServiceEntry {
    cluster: String,
    service: Service,
    /// Polls after an update before the rollout settles. `None` never settles.
    converge_after: Option<u32>,
    polls_since_update: u32,
    settled: bool,
}

#[derive(Debug)]
struct TaskEntry {
    task: Task,
    service: Option<String>,
    /// Exit codes applied to the containers once the task stops.
    exit_codes: Vec<Option<i64>>,
}

#[derive(Debug, Default)]
struct State {
    services: HashMap<String, ServiceEntry>,
    definitions: Vec<TaskDefinition>,
    tasks: Vec<TaskEntry>,
    exit_codes: Vec<Option<i64>>,
    run_failures: Vec<Failure>,
    tasks_never_stop: bool,
    forget_launched_tasks: bool,
    rules: HashMap<String, Rule>,
    targets: HashMap<String, Vec<Target>>,
    target_page_size: Option<usize>,
    rejected_targets: HashSet<String>,
    fail_next: HashMap<Operation, VecDeque<String>>,
    fail_always: HashMap<Operation, String>,
    fail_after: HashMap<Operation, (usize, String)>,
    requests: Vec<Request>,
    next_id: u64,
}

impl State {
    fn record(&mut self, request: Request) -> Result<(), ApiError> {
        let operation = request.operation();
        self.requests.push(request);

        if let Some(message) = self
            .fail_next
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front())
        {
            return Err(ApiError::remote(operation.name(), "ServerException", message));
        }
        if let Some(message) = self.fail_always.get(&operation) {
            return Err(ApiError::remote(
                operation.name(),
                "ServerException",
                message.clone(),
            ));
        }
        if let Some((succeed, message)) = self.fail_after.get(&operation) {
            let calls = self
                .requests
                .iter()
                .filter(|r| r.operation() == operation)
                .count();
            if calls > *succeed {
                return Err(ApiError::remote(
                    operation.name(),
                    "ServerException",
                    message.clone(),
                ));
            }
        }
        Ok(())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_definition(&self, reference: &str) -> Option<&TaskDefinition> {
        if let Some(found) = self.definitions.iter().find(|d| {
            d.task_definition_arn
                .as_ref()
                .is_some_and(|arn| arn.as_str() == reference)
                || d.display_name() == reference
        }) {
            return Some(found);
        }

        // Bare family: latest revision.
        self.definitions
            .iter()
            .filter(|d| d.family == reference)
            .max_by_key(|d| d.revision.unwrap_or_default())
    }

    fn insert_definition(&mut self, mut definition: TaskDefinition) -> TaskDefinition {
        let revision = self
            .definitions
            .iter()
            .filter(|d| d.family == definition.family)
            .filter_map(|d| d.revision)
            .max()
            .unwrap_or(0)
            + 1;
        definition.revision = Some(revision);
        definition.task_definition_arn = Some(TaskDefinitionArn::new(format!(
            "{}:task-definition/{}:{}",
            ACCOUNT_PREFIX, definition.family, revision
        )));
        definition.status = Some("ACTIVE".to_string());
        self.definitions.push(definition.clone());
        definition
    }

    /// Advance a service rollout by one observation.
    fn observe_service(&mut self, name: &str) {
        let Some(entry) = self.services.get_mut(name) else {
            return;
        };
        if entry.settled {
            return;
        }
        entry.polls_since_update += 1;
        if entry
            .converge_after
            .is_some_and(|n| entry.polls_since_update >= n)
        {
            self.settle_service(name);
        }
    }

    fn settle_service(&mut self, name: &str) {
        let Some(entry) = self.services.get_mut(name) else {
            return;
        };
        entry.settled = true;

        let service = &mut entry.service;
        let desired = service.desired_count;
        service.running_count = desired;
        service.pending_count = 0;
        service.deployments = vec![Deployment {
            id: Some(format!("ecs-svc/{}", service.task_definition)),
            status: DEPLOYMENT_PRIMARY.to_string(),
            task_definition: service.task_definition.clone(),
            desired_count: desired,
            running_count: desired,
            pending_count: 0,
            rollout_state: Some("COMPLETED".to_string()),
        }];
        let cluster = entry.cluster.clone();
        let task_definition = service.task_definition.clone();

        for existing in self
            .tasks
            .iter_mut()
            .filter(|t| t.service.as_deref() == Some(name))
        {
            existing.task.last_status = TASK_STOPPED.to_string();
            existing.task.desired_status = TASK_STOPPED.to_string();
        }

        for _ in 0..desired.max(0) {
            let id = self.next_id();
            self.tasks.push(TaskEntry {
                task: Task {
                    task_arn: TaskArn::new(format!("{}:task/{}/{:032x}", ACCOUNT_PREFIX, cluster, id)),
                    task_definition_arn: task_definition.clone(),
                    cluster_arn: None,
                    last_status: TASK_RUNNING.to_string(),
                    desired_status: TASK_RUNNING.to_string(),
                    containers: Vec::new(),
                    launch_type: None,
                    started_by: Some(format!("ecs-svc/{}", name)),
                    stopped_reason: None,
                },
                service: Some(name.to_string()),
                exit_codes: Vec::new(),
            });
        }
    }
}

/// An in-memory control plane for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryControlPlane {
    state: Mutex<State>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    /// Register a task definition fixture, assigning its ARN and revision.
    pub fn add_task_definition(&self, definition: TaskDefinition) -> TaskDefinition {
        self.state.lock().insert_definition(definition)
    }

    /// Add a settled service: one primary deployment, fully running.
    pub fn add_service(&self, cluster: &str, service: Service) {
        let name = service.service_name.clone();
        let mut state = self.state.lock();
        state.services.insert(
            name.clone(),
            ServiceEntry {
                cluster: cluster.to_string(),
                service,
                converge_after: Some(1),
                polls_since_update: 0,
                settled: false,
            },
        );
        state.settle_service(&name);
    }

    /// Number of observations after an update before the service settles.
    ///
    /// `None` keeps the rollout in progress forever.
    pub fn converge_after(&self, service: &str, polls: Option<u32>) {
        if let Some(entry) = self.state.lock().services.get_mut(service) {
            entry.converge_after = polls;
        }
    }

    /// Exit codes given to the containers of subsequently started tasks, in order.
    ///
    /// Containers beyond the list exit with 0.
    pub fn set_exit_codes(&self, codes: Vec<Option<i64>>) {
        self.state.lock().exit_codes = codes;
    }

    /// Keep run tasks in RUNNING forever.
    pub fn tasks_never_stop(&self) {
        self.state.lock().tasks_never_stop = true;
    }

    /// Start run tasks without keeping them, so later describes report them MISSING.
    pub fn forget_launched_tasks(&self) {
        self.state.lock().forget_launched_tasks = true;
    }

    /// Make the next run-task calls report these failures instead of starting tasks.
    pub fn set_run_failures(&self, failures: Vec<Failure>) {
        self.state.lock().run_failures = failures;
    }

    pub fn add_rule(&self, rule: Rule) {
        self.state.lock().rules.insert(rule.name.clone(), rule);
    }

    pub fn add_target(&self, rule: &str, target: Target) {
        self.state
            .lock()
            .targets
            .entry(rule.to_string())
            .or_default()
            .push(target);
    }

    /// Report put-targets failures for the target with this id.
    pub fn reject_target(&self, target_id: &str) {
        self.state
            .lock()
            .rejected_targets
            .insert(target_id.to_string());
    }

    pub fn set_target_page_size(&self, size: usize) {
        self.state.lock().target_page_size = Some(size.max(1));
    }

    /// Fail the next call of `operation` once.
    pub fn fail_next(&self, operation: Operation, message: &str) {
        self.state
            .lock()
            .fail_next
            .entry(operation)
            .or_default()
            .push_back(message.to_string());
    }

    /// Fail every call of `operation`.
    pub fn fail_always(&self, operation: Operation, message: &str) {
        self.state
            .lock()
            .fail_always
            .insert(operation, message.to_string());
    }

    /// Let `succeed` calls of `operation` through, then fail every later one.
    pub fn fail_after(&self, operation: Operation, succeed: usize, message: &str) {
        self.state
            .lock()
            .fail_after
            .insert(operation, (succeed, message.to_string()));
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.operation() == operation)
            .count()
    }

    pub fn update_requests(&self) -> Vec<UpdateServiceRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|r| match r {
                Request::UpdateService(u) => Some(u.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn run_requests(&self) -> Vec<RunTaskRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|r| match r {
                Request::RunTask(u) => Some(u.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.state
            .lock()
            .services
            .get(name)
            .map(|e| e.service.clone())
    }

    pub fn task_definitions(&self) -> Vec<TaskDefinition> {
        self.state.lock().definitions.clone()
    }

    pub fn targets(&self, rule: &str) -> Vec<Target> {
        self.state
            .lock()
            .targets
            .get(rule)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EcsApi for MemoryControlPlane {
    async fn describe_services(
        &self,
        request: &DescribeServicesRequest,
    ) -> Result<DescribeServicesResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::DescribeServices(request.clone()))?;

        let mut response = DescribeServicesResponse::default();
        for name in &request.services {
            state.observe_service(name);
            match state.services.get(name) {
                Some(entry) if entry.cluster == request.cluster => {
                    response.services.push(entry.service.clone());
                }
                _ => response.failures.push(Failure {
                    arn: Some(name.clone()),
                    reason: Some("MISSING".to_string()),
                    detail: None,
                }),
            }
        }
        Ok(response)
    }

    async fn update_service(
        &self,
        request: &UpdateServiceRequest,
    ) -> Result<UpdateServiceResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::UpdateService(request.clone()))?;

        let entry = state
            .services
            .get_mut(&request.service)
            .filter(|e| e.cluster == request.cluster)
            .ok_or_else(|| ApiError::NotFound(format!("service {}", request.service)))?;

        let service = &mut entry.service;
        if let Some(desired) = request.desired_count {
            service.desired_count = desired;
        }
        if let Some(ref config) = request.deployment_configuration {
            service.deployment_configuration = Some(config.clone());
        }

        let previous = std::mem::replace(&mut service.task_definition, request.task_definition.clone());
        let running = service.running_count;
        service.deployments = vec![
            Deployment {
                id: Some(format!("ecs-svc/{}", request.task_definition)),
                status: DEPLOYMENT_PRIMARY.to_string(),
                task_definition: request.task_definition.clone(),
                desired_count: service.desired_count,
                running_count: 0,
                pending_count: service.desired_count,
                rollout_state: Some("IN_PROGRESS".to_string()),
            },
            Deployment {
                id: Some(format!("ecs-svc/{}", previous)),
                status: "ACTIVE".to_string(),
                task_definition: previous,
                desired_count: running,
                running_count: running,
                pending_count: 0,
                rollout_state: Some("COMPLETED".to_string()),
            },
        ];
        let updated = service.clone();
        entry.polls_since_update = 0;
        entry.settled = false;
        if entry.converge_after == Some(0) {
            let name = request.service.clone();
            state.settle_service(&name);
            if let Some(entry) = state.services.get(&name) {
                return Ok(UpdateServiceResponse {
                    service: entry.service.clone(),
                });
            }
        }

        Ok(UpdateServiceResponse { service: updated })
    }

    async fn list_tasks(&self, request: &ListTasksRequest) -> Result<ListTasksResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::ListTasks(request.clone()))?;

        if let Some(ref service) = request.service_name {
            state.observe_service(service);
        }

        let task_arns = state
            .tasks
            .iter()
            .filter(|t| {
                request
                    .service_name
                    .as_ref()
                    .is_none_or(|s| t.service.as_ref() == Some(s))
            })
            .filter(|t| {
                request
                    .desired_status
                    .as_ref()
                    .is_none_or(|s| &t.task.desired_status == s)
            })
            .map(|t| t.task.task_arn.clone())
            .collect();

        Ok(ListTasksResponse {
            task_arns,
            next_token: None,
        })
    }

    async fn describe_tasks(
        &self,
        request: &DescribeTasksRequest,
    ) -> Result<DescribeTasksResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::DescribeTasks(request.clone()))?;
        let never_stop = state.tasks_never_stop;

        let mut response = DescribeTasksResponse::default();
        for arn in &request.tasks {
            let Some(entry) = state.tasks.iter_mut().find(|t| &t.task.task_arn == arn) else {
                response.failures.push(Failure {
                    arn: Some(arn.to_string()),
                    reason: Some("MISSING".to_string()),
                    detail: None,
                });
                continue;
            };

            // Run tasks move one lifecycle step per observation.
            if entry.service.is_none() {
                let task = &mut entry.task;
                if task.last_status == TASK_PENDING {
                    task.last_status = TASK_RUNNING.to_string();
                } else if task.last_status == TASK_RUNNING && !never_stop {
                    task.last_status = TASK_STOPPED.to_string();
                    task.desired_status = TASK_STOPPED.to_string();
                    for (i, container) in task.containers.iter_mut().enumerate() {
                        container.exit_code = entry.exit_codes.get(i).copied().unwrap_or(Some(0));
                        container.last_status = Some(TASK_STOPPED.to_string());
                    }
                }
            }
            response.tasks.push(entry.task.clone());
        }
        Ok(response)
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::RunTask(request.clone()))?;

        if !state.run_failures.is_empty() {
            return Ok(RunTaskResponse {
                tasks: Vec::new(),
                failures: state.run_failures.clone(),
            });
        }

        let definition = state
            .find_definition(request.task_definition.as_str())
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("task definition {}", request.task_definition)))?;

        let mut tasks = Vec::new();
        for _ in 0..request.count.max(1) {
            let id = state.next_id();
            let containers = definition
                .container_definitions
                .iter()
                .enumerate()
                .map(|(i, c)| Container {
                    name: Some(c.name.clone().unwrap_or_else(|| format!("container-{}", i))),
                    container_arn: Some(format!("{}:container/{:032x}/{}", ACCOUNT_PREFIX, id, i)),
                    exit_code: None,
                    last_status: Some(TASK_PENDING.to_string()),
                    reason: None,
                })
                .collect();
            let task = Task {
                task_arn: TaskArn::new(format!(
                    "{}:task/{}/{:032x}",
                    ACCOUNT_PREFIX, request.cluster, id
                )),
                task_definition_arn: definition
                    .task_definition_arn
                    .clone()
                    .unwrap_or_else(|| request.task_definition.clone()),
                cluster_arn: None,
                last_status: TASK_PENDING.to_string(),
                desired_status: TASK_RUNNING.to_string(),
                containers,
                launch_type: Some(request.launch_type),
                started_by: request.started_by.clone(),
                stopped_reason: None,
            };
            if !state.forget_launched_tasks {
                let exit_codes = state.exit_codes.clone();
                state.tasks.push(TaskEntry {
                    task: task.clone(),
                    service: None,
                    exit_codes,
                });
            }
            tasks.push(task);
        }

        Ok(RunTaskResponse {
            tasks,
            failures: Vec::new(),
        })
    }

    async fn describe_task_definition(
        &self,
        request: &DescribeTaskDefinitionRequest,
    ) -> Result<TaskDefinitionResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::DescribeTaskDefinition(request.clone()))?;

        state
            .find_definition(&request.task_definition)
            .cloned()
            .map(|task_definition| TaskDefinitionResponse { task_definition })
            .ok_or_else(|| ApiError::NotFound(format!("task definition {}", request.task_definition)))
    }

    async fn register_task_definition(
        &self,
        request: &RegisterTaskDefinitionRequest,
    ) -> Result<TaskDefinitionResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::RegisterTaskDefinition(request.clone()))?;

        let definition = TaskDefinition {
            task_definition_arn: None,
            family: request.family.clone(),
            revision: None,
            container_definitions: request.container_definitions.clone(),
            cpu: request.cpu.clone(),
            memory: request.memory.clone(),
            network_mode: request.network_mode.clone(),
            execution_role_arn: request.execution_role_arn.clone(),
            task_role_arn: request.task_role_arn.clone(),
            ipc_mode: request.ipc_mode.clone(),
            pid_mode: request.pid_mode.clone(),
            placement_constraints: request.placement_constraints.clone(),
            requires_compatibilities: request.requires_compatibilities.clone(),
            volumes: request.volumes.clone(),
            status: None,
            extra: request.extra.clone(),
        };

        Ok(TaskDefinitionResponse {
            task_definition: state.insert_definition(definition),
        })
    }
}

#[async_trait]
impl EventsApi for MemoryControlPlane {
    async fn describe_rule(&self, request: &DescribeRuleRequest) -> Result<Rule, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::DescribeRule(request.clone()))?;

        state
            .rules
            .get(&request.name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("rule {}", request.name)))
    }

    async fn list_targets_by_rule(
        &self,
        request: &ListTargetsByRuleRequest,
    ) -> Result<ListTargetsByRuleResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::ListTargetsByRule(request.clone()))?;

        let all = state.targets.get(&request.rule).cloned().unwrap_or_default();
        let start = request
            .next_token
            .as_deref()
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(0);
        let size = state.target_page_size.unwrap_or(all.len().max(1));
        let end = (start + size).min(all.len());

        Ok(ListTargetsByRuleResponse {
            targets: all.get(start..end).map(<[Target]>::to_vec).unwrap_or_default(),
            next_token: (end < all.len()).then(|| end.to_string()),
        })
    }

    async fn put_targets(
        &self,
        request: &PutTargetsRequest,
    ) -> Result<PutTargetsResponse, ApiError> {
        let mut state = self.state.lock();
        state.record(Request::PutTargets(request.clone()))?;

        let mut response = PutTargetsResponse::default();
        for target in &request.targets {
            if state.rejected_targets.contains(&target.id) {
                response.failed_entry_count += 1;
                response.failed_entries.push(FailedEntry {
                    target_id: Some(target.id.clone()),
                    error_code: Some("ConcurrentModificationException".to_string()),
                    error_message: Some("target is being modified".to_string()),
                });
                continue;
            }

            let stored = state.targets.entry(request.rule.clone()).or_default();
            match stored.iter_mut().find(|t| t.id == target.id) {
                Some(existing) => *existing = target.clone(),
                None => stored.push(target.clone()),
            }
        }
        Ok(response)
    }
}
