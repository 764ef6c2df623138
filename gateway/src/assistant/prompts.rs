pub const REPORT_PLANNER_QUERY_WRITER_INSTRUCTIONS: &str = r#"You are performing research for a report.

<Report topic>
{topic}
</Report topic>

<Report organization>
{report_organization}
</Report organization>

<Task>
Your goal is to generate {number_of_queries} web search queries that will help gather information for planning the report sections.
The queries should be related to the report topic and help satisfy the requirements of the report organization.
Make them specific enough to find high-quality, relevant sources.
</Task>

Format your response as JSON with a single key 'queries' containing a list of search queries."#;

pub const REPORT_PLANNER_INSTRUCTIONS: &str = r#"I want a plan for a report that is concise and focused.

<Report topic>
{topic}
</Report topic>

<Report organization>
{report_organization}
</Report organization>

<Context>
Here is context to use to plan the sections of the report:
{context}
</Context>

<Task>
Generate a list of sections for the report. Each section has:
- name: name of this section of the report
- description: brief overview of the main topics covered in this section
- research: whether web research is needed for this section
- content: leave empty for now

Introduction and conclusion do not need research; they are written from the other sections.
Avoid overlapping sections and filler.
</Task>

<Feedback>
Feedback from review on the report structure (if any):
{feedback}
</Feedback>

Format your response as JSON with a single key 'sections' containing the list of sections."#;

pub const QUERY_WRITER_INSTRUCTIONS: &str = r#"You are an expert technical writer crafting targeted web search queries that will gather comprehensive information for writing a report section.

<Report topic>
{topic}
</Report topic>

<Section topic>
{section_topic}
</Section topic>

<Task>
Generate {number_of_queries} search queries that cover different aspects of the section topic, include specific technical terms, and favour recent information where it matters.
</Task>

Format your response as JSON with a single key 'queries' containing a list of search queries."#;

pub const SECTION_WRITER_INSTRUCTIONS: &str = r####"You are an expert technical writer writing one section of a report.

<Report topic>
{topic}
</Report topic>

<Section name>
{section_name}
</Section name>

<Section topic>
{section_topic}
</Section topic>

<Existing section content (if populated)>
{section_content}
</Existing section content>

<Source material>
{context}
</Source material>

<Guidelines>
- If existing content is populated, write a new section that enhances and synthesizes it with the source material.
- 150-200 words, plain and technical language, no marketing tone.
- Start with a "## {section_name}" header.
- End with a "### Sources" list of the URLs used.
</Guidelines>"####;

pub const SECTION_GRADER_INSTRUCTIONS: &str = r#"Review a report section relative to the specified topic:

<Report topic>
{topic}
</Report topic>

<Section topic>
{section_topic}
</Section topic>

<Section content>
{section}
</Section content>

<Task>
Evaluate whether the section content adequately addresses the section topic.
If it does not, generate {number_of_follow_up_queries} follow-up search queries to gather the missing information.
</Task>

Format your response as JSON with keys 'grade' ("pass" or "fail") and 'follow_up_queries' (a list of search queries)."#;

pub const FINAL_SECTION_WRITER_INSTRUCTIONS: &str = r####"You are an expert technical writer crafting a section that synthesizes information from the rest of the report.

<Report topic>
{topic}
</Report topic>

<Section name>
{section_name}
</Section name>

<Section topic>
{section_topic}
</Section topic>

<Available report content>
{context}
</Available report content>

<Guidelines>
- An introduction uses a "# " title, 50-100 words, no structural elements and no sources.
- A conclusion uses a "## " header, 100-150 words, and at most one table or list that distills the report.
- Write in Markdown without preamble.
</Guidelines>"####;

pub const PLAN_QUERIES_REQUEST: &str =
    "Generate search queries that will help with planning the sections of the report.";

pub const PLAN_SECTIONS_REQUEST: &str = "Generate the sections of the report. Your response must include a 'sections' field containing a list of sections. Each section must have: name, description, research, and content fields.";

pub const SECTION_QUERIES_REQUEST: &str = "Generate search queries on the provided section topic.";

pub const WRITE_SECTION_REQUEST: &str =
    "Generate a report section based on the existing section content and the provided sources.";

pub const GRADE_SECTION_REQUEST: &str =
    "Grade the report section and consider follow-up questions for missing information.";

pub const WRITE_FINAL_SECTION_REQUEST: &str =
    "Generate a report section based on the available report content.";

pub fn format_report_planner_query_writer_instructions(
    topic: &str,
    report_organization: &str,
    number_of_queries: u32,
) -> String {
    REPORT_PLANNER_QUERY_WRITER_INSTRUCTIONS
        .replace("{topic}", topic)
        .replace("{report_organization}", report_organization)
        .replace("{number_of_queries}", &number_of_queries.to_string())
}

pub fn format_report_planner_instructions(
    topic: &str,
    report_organization: &str,
    context: &str,
    feedback: Option<&str>,
) -> String {
    REPORT_PLANNER_INSTRUCTIONS
        .replace("{topic}", topic)
        .replace("{report_organization}", report_organization)
        .replace("{feedback}", feedback.unwrap_or(""))
        .replace("{context}", context)
}

pub fn format_query_writer_instructions(topic: &str, section_topic: &str, number_of_queries: u32) -> String {
    QUERY_WRITER_INSTRUCTIONS
        .replace("{topic}", topic)
        .replace("{section_topic}", section_topic)
        .replace("{number_of_queries}", &number_of_queries.to_string())
}

pub fn format_section_writer_instructions(
    topic: &str,
    section_name: &str,
    section_topic: &str,
    section_content: &str,
    context: &str,
) -> String {
    SECTION_WRITER_INSTRUCTIONS
        .replace("{topic}", topic)
        .replace("{section_name}", section_name)
        .replace("{section_topic}", section_topic)
        .replace("{section_content}", section_content)
        .replace("{context}", context)
}

pub fn format_section_grader_instructions(
    topic: &str,
    section_topic: &str,
    section: &str,
    number_of_follow_up_queries: u32,
) -> String {
    SECTION_GRADER_INSTRUCTIONS
        .replace("{topic}", topic)
        .replace("{section_topic}", section_topic)
        .replace("{number_of_follow_up_queries}", &number_of_follow_up_queries.to_string())
        .replace("{section}", section)
}

pub fn format_final_section_writer_instructions(
    topic: &str,
    section_name: &str,
    section_topic: &str,
    context: &str,
) -> String {
    FINAL_SECTION_WRITER_INSTRUCTIONS
        .replace("{topic}", topic)
        .replace("{section_name}", section_name)
        .replace("{section_topic}", section_topic)
        .replace("{context}", context)
}
