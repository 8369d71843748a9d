//! User message templates

pub const CLASSIFY: &str = "用户消息：{{ message }}";

pub const ANALYSIS: &str = r"请点评 {{ stock_code }}{% if name %}（{{ name }}）{% endif %} 的技术面。

技术指标：
{{ technical }}
{% if sectors %}
板块资金流：
{{ sectors }}
{% endif %}{% if brief %}
历史记忆：
{{ brief }}
{% endif %}";
