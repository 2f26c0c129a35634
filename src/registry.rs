// Employee, holiday, and leave registries. Holiday and leave resolution are
// external concerns; the engine only consumes the flags these registries
// produce.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::info;

use crate::model::EmployeeId;
use crate::policy::{Employee, PolicyDefaults, PolicySnapshot};

#[derive(Clone, Default)]
pub struct EmployeeRegistry {
    employees: Arc<Mutex<HashMap<EmployeeId, Employee>>>,
    holidays: Arc<Mutex<HashSet<NaiveDate>>>,
    leaves: Arc<Mutex<HashSet<(EmployeeId, NaiveDate)>>>,
    defaults: PolicyDefaults,
}

impl EmployeeRegistry {
    pub fn new(defaults: PolicyDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn upsert_employee(&self, employee: Employee) {
        info!(employee_id = %employee.employee_id, name = %employee.name, "configuring employee");
        self.employees
            .lock()
            .expect("registry mutex poisoned")
            .insert(employee.employee_id.clone(), employee);
    }

    pub fn get_employee(&self, employee_id: &str) -> Option<Employee> {
        self.employees
            .lock()
            .expect("registry mutex poisoned")
            .get(employee_id)
            .cloned()
    }

    pub fn all_employee_ids(&self) -> Vec<EmployeeId> {
        self.employees
            .lock()
            .expect("registry mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn add_holiday(&self, date: NaiveDate) {
        info!(%date, "configuring holiday");
        self.holidays
            .lock()
            .expect("registry mutex poisoned")
            .insert(date);
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays
            .lock()
            .expect("registry mutex poisoned")
            .contains(&date)
    }

    pub fn add_leave(&self, employee_id: impl Into<EmployeeId>, date: NaiveDate) {
        let employee_id = employee_id.into();
        info!(%employee_id, %date, "configuring approved leave");
        self.leaves
            .lock()
            .expect("registry mutex poisoned")
            .insert((employee_id, date));
    }

    pub fn on_leave(&self, employee_id: &str, date: NaiveDate) -> bool {
        self.leaves
            .lock()
            .expect("registry mutex poisoned")
            .contains(&(employee_id.to_string(), date))
    }

    /// Policy snapshot for one top-level call. Unknown employees resolve to
    /// bare defaults so the engine can still classify their days.
    pub fn snapshot(&self, employee_id: &str) -> PolicySnapshot {
        match self.get_employee(employee_id) {
            Some(emp) => PolicySnapshot::resolve(&emp, &self.defaults),
            None => PolicySnapshot::from_defaults(employee_id, &self.defaults),
        }
    }
}
