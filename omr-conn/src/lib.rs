//! 外部 OMR 评分程序连接器
//!
//! 评分逻辑（答题卡识别、答案比对、计分）全部位于外部程序中，
//! 本 crate 只负责以子进程方式调用它并解析其 JSON 输出。

pub mod evaluator;
pub mod protocol;

pub use evaluator::{EvaluatorError, EvaluatorOptions, ProcessEvaluator};
pub use protocol::{AnswerKeyVersion, EvaluationOutput, ParseVersionError, ScoreSheet};
