//! 批次切分
//! - 批量创建：按固定数量切分
//! - 过滤参数（按 id/名称批量删除或查询）：按编码后长度与数量双上限切分，先触达者关闭当前批次

use url::form_urlencoded::byte_serialize;

use crate::error::{CoreError, CoreResult};

/// 过滤值之间的分隔符
const SEPARATOR: &str = ",";

/// 一个过滤批次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBatch {
    /// 本批次包含的原始值
    pub values: Vec<String>,
    /// 拼接后的过滤参数值（未编码），例如 `ids:a,b,c`
    pub filter: String,
}

/// 过滤参数批次切分器
#[derive(Debug, Clone)]
pub struct FilterBatcher {
    /// 过滤参数前缀，例如 `ids:` 或 `name:`
    prefix: String,
    /// 编码后参数长度上限（远端 URL 长度限制）
    max_encoded_len: usize,
    /// 单批次最大值数量
    max_count: usize,
}

/// 计算字符串经 URL 查询参数编码后的字节长度
pub fn encoded_len(value: &str) -> usize {
    byte_serialize(value.as_bytes()).map(str::len).sum()
}

/// 按固定数量切分，`size` 为 0 时报错
pub fn chunk_by_count<T>(items: &[T], size: usize) -> CoreResult<std::slice::Chunks<'_, T>> {
    if size == 0 {
        return Err(CoreError::InvalidInput("batch size must be greater than zero".to_string()));
    }
    Ok(items.chunks(size))
}

impl FilterBatcher {
    pub fn new(prefix: impl Into<String>, max_encoded_len: usize, max_count: usize) -> CoreResult<Self> {
        let prefix = prefix.into();
        if max_count == 0 {
            return Err(CoreError::InvalidInput("filter batch count must be greater than zero".to_string()));
        }
        if max_encoded_len <= encoded_len(&prefix) {
            return Err(CoreError::InvalidInput(format!(
                "filter length ceiling {} leaves no room after prefix {:?}",
                max_encoded_len, prefix
            )));
        }
        Ok(Self {
            prefix,
            max_encoded_len,
            max_count,
        })
    }

    /// 按顺序切分过滤值，空输入返回空列表
    ///
    /// 单个值本身（连同前缀）已超过长度上限时返回 `InvalidInput`
    pub fn partition<S: AsRef<str>>(&self, values: &[S]) -> CoreResult<Vec<FilterBatch>> {
        let prefix_len = encoded_len(&self.prefix);
        let separator_len = encoded_len(SEPARATOR);

        let mut batches = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = prefix_len;

        for value in values {
            let value = value.as_ref();
            let value_len = encoded_len(value);
            if prefix_len + value_len > self.max_encoded_len {
                return Err(CoreError::InvalidInput(format!(
                    "filter value {:?} alone exceeds the encoded length ceiling of {}",
                    value, self.max_encoded_len
                )));
            }

            let added = if current.is_empty() { value_len } else { separator_len + value_len };
            if !current.is_empty() && (current.len() >= self.max_count || current_len + added > self.max_encoded_len) {
                batches.push(self.close(std::mem::take(&mut current)));
                current_len = prefix_len;
                current.push(value.to_string());
                current_len += value_len;
                continue;
            }

            current.push(value.to_string());
            current_len += added;
        }

        if !current.is_empty() {
            batches.push(self.close(current));
        }

        log::debug!(
            "partitioned {} filter values into {} batch(es) (prefix {:?}, ceiling {}, cap {})",
            values.len(),
            batches.len(),
            self.prefix,
            self.max_encoded_len,
            self.max_count
        );
        Ok(batches)
    }

    fn close(&self, values: Vec<String>) -> FilterBatch {
        let filter = format!("{}{}", self.prefix, values.join(SEPARATOR));
        FilterBatch { values, filter }
    }
}
