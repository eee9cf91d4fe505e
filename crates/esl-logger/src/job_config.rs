//! Pipeline details extracted from a job's `config.xml`.

use roxmltree::{Document, Node};
use serde::Serialize;

const PIPELINE_ROOT: &str = "flow-definition";
const GIT_SCM_CLASS: &str = "hudson.plugins.git.GitSCM";
const MULTIBRANCH_PROPERTY: &str = "org.jenkinsci.plugins.workflow.multibranch.BranchJobProperty";

/// Pipeline definition classes and the type names reported for them.
const PIPELINE_TYPES: &[(&str, PipelineJobType)] = &[
    (
        "org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition",
        PipelineJobType::Script,
    ),
    (
        "org.jenkinsci.plugins.workflow.cps.CpsScmFlowDefinition",
        PipelineJobType::Scm,
    ),
    (
        "org.jenkinsci.plugins.workflow.multibranch.SCMBinder",
        PipelineJobType::Multibranch,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineJobType {
    Script,
    #[serde(rename = "SCM")]
    Scm,
    Multibranch,
    Unknown,
}

/// What es-logger records about a job's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pipeline_job: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_job_type: Option<PipelineJobType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jenkinsfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}

/// Parse `config.xml` text. Only malformed XML is an error.
pub fn parse_job_config(xml: &str) -> Result<JobConfigInfo, roxmltree::Error> {
    let doc = Document::parse(xml)?;
    Ok(pipeline_job_info(doc.root_element()))
}

fn pipeline_job_info(root: Node<'_, '_>) -> JobConfigInfo {
    if root.tag_name().name() != PIPELINE_ROOT {
        return JobConfigInfo {
            is_pipeline_job: Some(false),
            ..Default::default()
        };
    }

    let job_type = pipeline_job_type(root);
    let mut info = JobConfigInfo {
        is_pipeline_job: Some(true),
        pipeline_job_type: Some(job_type),
        ..Default::default()
    };

    // Both SCM flavours run a Jenkinsfile, but keep their SCM in different places
    let scm_parent: &[&str] = match job_type {
        PipelineJobType::Scm => &["definition"],
        PipelineJobType::Multibranch => &["properties", MULTIBRANCH_PROPERTY, "branch"],
        PipelineJobType::Script | PipelineJobType::Unknown => return info,
    };

    info.jenkinsfile = find(root, &["definition", "scriptPath"]).and_then(text);

    let scm_path = join(scm_parent, &["scm"]);
    let is_git = find(root, &scm_path).and_then(|scm| scm.attribute("class")) == Some(GIT_SCM_CLASS);
    if is_git {
        let url = join(
            &scm_path,
            &["userRemoteConfigs", "hudson.plugins.git.UserRemoteConfig", "url"],
        );
        let branch = join(&scm_path, &["branches", "hudson.plugins.git.BranchSpec", "name"]);
        info.git_repo = find(root, &url).and_then(text);
        info.git_branch = find(root, &branch).and_then(text);
    }
    info
}

fn pipeline_job_type(root: Node<'_, '_>) -> PipelineJobType {
    let class = find(root, &["definition"]).and_then(|d| d.attribute("class"));
    let found = class.and_then(|class| {
        PIPELINE_TYPES
            .iter()
            .find(|(name, _)| *name == class)
            .map(|(_, kind)| *kind)
    });
    match found {
        Some(kind) => {
            tracing::debug!(pipeline_type = ?kind, "pipeline type");
            kind
        }
        None => {
            tracing::error!(class = ?class, "pipeline type not found");
            PipelineJobType::Unknown
        }
    }
}

/// First element in document order reached by following `path` from `node`.
fn find<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    let Some((first, rest)) = path.split_first() else {
        return Some(node);
    };
    node.children()
        .filter(|child| child.is_element() && child.tag_name().name() == *first)
        .find_map(|child| find(child, rest))
}

fn join(base: &[&'static str], tail: &[&'static str]) -> Vec<&'static str> {
    base.iter().chain(tail).copied().collect()
}

fn text(node: Node<'_, '_>) -> Option<String> {
    node.text().map(str::to_string)
}
