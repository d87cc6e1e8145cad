//! Built-in benchmark scenarios
//!
//! The filesystem scenario set the CLI runs by default. Each is authored for
//! mock mode (a scripted LLM drives the loop deterministically) but works in
//! real mode too — the expectations only constrain tool traffic and outcomes.

use std::time::Duration;

use serde_json::json;

use crate::harness::scenario::{
    BenchmarkScenario, ContentMatch, ContextInjection, ExpectedToolInvocation,
    FileContentExpectation, InjectedFile, ScriptedReply, ValidationConfig, WorkspaceConfig,
};

/// All built-in scenarios
pub fn builtin_scenarios() -> Vec<BenchmarkScenario> {
    vec![read_file_basic(), delete_file_recursive(), write_file_no_overwrite()]
}

/// Look up a built-in scenario by id
pub fn find_scenario(id: &str) -> Option<BenchmarkScenario> {
    builtin_scenarios().into_iter().find(|s| s.id == id)
}

fn read_file_basic() -> BenchmarkScenario {
    BenchmarkScenario {
        id: "fs-read-file-basic".into(),
        category: "filesystem".into(),
        description: "Read a seeded file and report its contents".into(),
        tags: vec!["smoke".into(), "read".into()],
        workspace: WorkspaceConfig {
            files: vec![InjectedFile {
                path: "readme.txt".into(),
                content: "This is the workspace readme".into(),
            }],
            ..Default::default()
        },
        context: ContextInjection {
            prompts: vec!["Read the contents of readme.txt".into()],
            llm_script: vec![
                ScriptedReply::ToolCall {
                    tool_name: "read_file".into(),
                    args: json!({"file_path": "readme.txt"}),
                },
                ScriptedReply::Final {
                    content: "The readme says: \"This is the workspace readme\"".into(),
                },
            ],
            ..Default::default()
        },
        expected_tools: vec![ExpectedToolInvocation {
            tool_name: "read_file".into(),
            min_invocations: 1,
            max_invocations: Some(1),
            args_subset: Some(json!({"file_path": "readme.txt"})),
        }],
        validation: ValidationConfig {
            expect_success: true,
            tool_result_matches: vec![ContentMatch::new(&["This is the workspace readme"])],
            response_matches: vec![ContentMatch::new(&["This is the workspace readme"])],
            ..Default::default()
        },
        timeout: Duration::from_secs(30),
    }
}

fn delete_file_recursive() -> BenchmarkScenario {
    BenchmarkScenario {
        id: "fs-delete-file-recursive".into(),
        category: "filesystem".into(),
        description: "Recursively delete a directory tree".into(),
        tags: vec!["delete".into()],
        workspace: WorkspaceConfig {
            directories: vec!["delete_dir/nested".into()],
            files: vec![
                InjectedFile {
                    path: "delete_dir/top.txt".into(),
                    content: "top-level file".into(),
                },
                InjectedFile {
                    path: "delete_dir/nested/inner.txt".into(),
                    content: "nested file".into(),
                },
            ],
            ..Default::default()
        },
        context: ContextInjection {
            prompts: vec!["Delete the directory delete_dir and everything inside it".into()],
            llm_script: vec![
                ScriptedReply::ToolCall {
                    tool_name: "delete_file".into(),
                    args: json!({"target_path": "delete_dir", "recursive": true}),
                },
                ScriptedReply::Final {
                    content: "Deleted delete_dir and all of its contents.".into(),
                },
            ],
            ..Default::default()
        },
        expected_tools: vec![ExpectedToolInvocation {
            tool_name: "delete_file".into(),
            min_invocations: 1,
            max_invocations: Some(1),
            args_subset: Some(json!({"target_path": "delete_dir", "recursive": true})),
        }],
        validation: ValidationConfig {
            expect_success: true,
            files_absent: vec!["delete_dir".into()],
            ..Default::default()
        },
        timeout: Duration::from_secs(30),
    }
}

fn write_file_no_overwrite() -> BenchmarkScenario {
    BenchmarkScenario {
        id: "fs-write-file-no-overwrite".into(),
        category: "filesystem".into(),
        description: "Refuse to clobber an existing file when overwrite is off".into(),
        tags: vec!["write".into(), "guard".into()],
        workspace: WorkspaceConfig {
            files: vec![InjectedFile {
                path: "existing_write.txt".into(),
                content: "Original content".into(),
            }],
            ..Default::default()
        },
        context: ContextInjection {
            prompts: vec![
                "Write 'New content' to existing_write.txt, but never overwrite an existing file"
                    .into(),
            ],
            llm_script: vec![
                ScriptedReply::ToolCall {
                    tool_name: "write_file".into(),
                    args: json!({
                        "file_path": "existing_write.txt",
                        "content": "New content",
                        "overwrite": false
                    }),
                },
                // The guard stops the run before this plays; kept for real mode.
                ScriptedReply::Final {
                    content: "The file already exists, so I did not overwrite it.".into(),
                },
            ],
            ..Default::default()
        },
        expected_tools: vec![ExpectedToolInvocation {
            tool_name: "write_file".into(),
            min_invocations: 0,
            max_invocations: Some(1),
            args_subset: Some(json!({"overwrite": false})),
        }],
        validation: ValidationConfig {
            expect_success: false,
            response_matches: vec![ContentMatch::new(&["exists", "already"])],
            tool_result_matches: vec![ContentMatch::new(&["exists", "already"])],
            stop_reason_matches: vec![ContentMatch::new(&["non-recoverable"])],
            file_contents: vec![FileContentExpectation {
                path: "existing_write.txt".into(),
                equals: "Original content".into(),
            }],
            ..Default::default()
        },
        timeout: Duration::from_secs(30),
    }
}
