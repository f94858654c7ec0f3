// All LLM prompt constants for the extraction module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System instruction enumerating the extraction rules.
pub const EXTRACTION_SYSTEM: &str = "\
You are an expert at analyzing academic syllabi. \
Your job is to extract EVERY assignment, homework, quiz, exam, project, paper, reading, \
presentation, lab and deadline described in a syllabus. \
Extract ALL of them, even small ones such as weekly homeworks, reading assignments or minor quizzes. \
Look carefully at course schedules, weekly breakdowns, tables, bullet points and inline text. \
Do NOT include class participation or attendance: these are not assignments. \
If assignments are numbered (HW1, HW2, ...), list each one as a separate item. \
If there is a weekly schedule, extract each week's assignments separately.";

/// User message template. Replace `{json_only}` and `{syllabus_text}` before sending.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract the course information and every assignment from the syllabus below.

For each assignment provide:
1. title: specific name (e.g. "Homework 1", "Midterm Exam", "Chapter 3 Reading")
2. type: one of [homework, quiz, exam, project, paper, reading, presentation, lab, other]
3. due_date: YYYY-MM-DD, or null if not specified
4. due_time: HH:MM if specified, otherwise null
5. description: brief description, or null
6. weight: grade weight as a decimal (0.20 for 20%), or null
7. estimated_hours: your estimate of the hours needed

Return a JSON object with this EXACT schema:
{
  "course_info": {
    "course_name": "string or null",
    "instructor": "string or null",
    "semester": "string or null"
  },
  "assignments": [
    {
      "title": "string",
      "type": "string",
      "due_date": "YYYY-MM-DD or null",
      "due_time": "HH:MM or null",
      "description": "string or null",
      "weight": 0.0,
      "estimated_hours": 2.0
    }
  ]
}

{json_only}

SYLLABUS TEXT:
{syllabus_text}

JSON RESPONSE:"#;
