use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 编译输出目录
pub const BIN_FOLDER: &str = "bin";
/// 中间产物目录
pub const OBJ_FOLDER: &str = "obj";
/// 依赖缓存目录
pub const PACKAGES_FOLDER: &str = "packages";
/// 测试结果目录
pub const TEST_RESULTS_FOLDER: &str = "TestResults";
/// IDE 元数据目录
pub const IDE_METADATA_FOLDER: &str = ".vs";

const IIS_EXPRESS_FOLDER: &str = "IISExpress";
const EXTERNAL_LOG_FOLDER: &str = "Logs";
const EXTERNAL_TRACE_FOLDER: &str = "TraceLogFiles";

/// 可删除目录类别的开关集合
///
/// 编排器在每次运行开始时取一份快照，运行期间对设置的修改不会影响正在进行的运行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionRuleSet {
    /// 删除 `bin` 和 `obj` 目录
    pub delete_build_output_folders: bool,
    /// 删除 `packages` 目录
    pub delete_packages_folder: bool,
    /// 删除 `TestResults` 目录
    pub delete_test_results_folder: bool,
    /// 删除 `.vs` 目录
    pub delete_ide_metadata_folder: bool,
    /// 删除用户文档目录下的 IIS Express `Logs` 目录
    pub delete_external_log_folder: bool,
    /// 删除用户文档目录下的 IIS Express `TraceLogFiles` 目录
    pub delete_external_trace_folder: bool,
    /// 同时执行宿主自带的清理命令
    pub run_native_clean: bool,
    /// 工作区关闭时自动运行
    pub run_on_workspace_close: bool,
}

impl Default for DeletionRuleSet {
    fn default() -> Self {
        Self {
            delete_build_output_folders: true,
            delete_packages_folder: false,
            delete_test_results_folder: false,
            delete_ide_metadata_folder: false,
            delete_external_log_folder: false,
            delete_external_trace_folder: false,
            run_native_clean: true,
            run_on_workspace_close: false,
        }
    }
}

impl DeletionRuleSet {
    /// 不删除任何目录的规则集
    pub fn none() -> Self {
        Self {
            delete_build_output_folders: false,
            run_native_clean: false,
            ..Default::default()
        }
    }

    /// 项目目录内按名称匹配的目录
    pub fn folder_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();

        if self.delete_build_output_folders {
            names.push(BIN_FOLDER);
            names.push(OBJ_FOLDER);
        }
        if self.delete_packages_folder {
            names.push(PACKAGES_FOLDER);
        }
        if self.delete_test_results_folder {
            names.push(TEST_RESULTS_FOLDER);
        }
        if self.delete_ide_metadata_folder {
            names.push(IDE_METADATA_FOLDER);
        }

        names
    }

    /// 项目目录之外的固定目录（相对于 `external_base`）
    pub fn external_folders(&self, external_base: &Path) -> Vec<PathBuf> {
        let iis_express = external_base.join(IIS_EXPRESS_FOLDER);
        let mut folders = Vec::new();

        if self.delete_external_log_folder {
            folders.push(iis_express.join(EXTERNAL_LOG_FOLDER));
        }
        if self.delete_external_trace_folder {
            folders.push(iis_express.join(EXTERNAL_TRACE_FOLDER));
        }

        folders
    }

    /// 是否启用了任何目录类别
    pub fn has_any_folder_rule(&self) -> bool {
        !self.folder_names().is_empty()
            || self.delete_external_log_folder
            || self.delete_external_trace_folder
    }
}
