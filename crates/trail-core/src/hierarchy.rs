//! Flattening the HR org chart into a list of employees.
//!
//! The org-chart service answers every query with a tree rooted at the
//! *global* root, expanded down to the requested employee's reports. To list
//! a node's reports we fetch again from that node and walk back down the
//! path of child indices recorded on the way in.

use std::future::Future;

use crate::{
  entity::Employee,
  error::{Error, Operation, Result},
};

/// One node of the org chart as the service returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgNode {
  pub id:                  String,
  pub name:                String,
  pub supervisor_id:       String,
  pub direct_report_count: u32,
  pub reports:             Vec<OrgNode>,
}

impl OrgNode {
  fn to_employee(&self) -> Employee {
    Employee {
      supervisor_id: self.supervisor_id.clone(),
      reports_count: self.direct_report_count,
      ..Employee::new(&self.id, &self.name)
    }
  }
}

/// The org-chart service.
pub trait OrgChart: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The chart expanded down to `id`'s direct reports.
  fn fetch<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<OrgNode, Self::Error>> + Send + 'a;
}

/// Walk the chart from `root_id`, returning every employee in pre-order.
pub async fn flatten<C: OrgChart>(chart: &C, root_id: &str) -> Result<Vec<Employee>> {
  let root = fetch(chart, root_id).await?;

  let mut people: Vec<Employee> = vec![];
  let mut pending: Vec<(OrgNode, Vec<usize>)> = vec![(root, vec![])];

  while let Some((person, path)) = pending.pop() {
    tracing::debug!(
      name = %person.name,
      reports = person.direct_report_count,
      ?path,
      seen = people.len(),
      "visiting org chart node"
    );
    people.push(person.to_employee());

    if person.direct_report_count == 0 {
      continue;
    }

    let tree = fetch(chart, &person.id).await?;
    let subtree = locate(tree, &path, &person.id)?;

    // Reverse so the first report is visited next.
    for (index, report) in subtree.reports.into_iter().enumerate().rev() {
      let mut child_path = path.clone();
      child_path.push(index);
      pending.push((report, child_path));
    }
  }

  Ok(people)
}

async fn fetch<C: OrgChart>(chart: &C, id: &str) -> Result<OrgNode> {
  chart
    .fetch(id)
    .await
    .map_err(|e| Error::transport(Operation::FetchOrgChart, Some(id), e))
}

/// Follow `path` down from the global root and check we land on `expected`.
fn locate(tree: OrgNode, path: &[usize], expected: &str) -> Result<OrgNode> {
  let mut cursor = tree;
  for &index in path {
    let next = cursor.reports.into_iter().nth(index);
    cursor = next.ok_or_else(|| Error::TreeConsistency {
      expected: expected.to_owned(),
      found:    None,
      path:     path.to_vec(),
    })?;
  }

  if cursor.id != expected {
    return Err(Error::TreeConsistency {
      expected: expected.to_owned(),
      found:    Some(cursor.id),
      path:     path.to_vec(),
    });
  }
  Ok(cursor)
}
